use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaAccessError {
    #[error("permission denied for {0}")]
    PermissionDenied(String),
    #[error("media device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("media backend error: {0}")]
    Backend(String),
}

/// What to request from a capture device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: false,
            width: None,
            height: None,
        }
    }
}

/// A camera-like source of frames.
///
/// Implementations own the OS device handle from `open` until `release`.
/// `release` must be idempotent and safe to call on a device that never
/// opened or failed half-way through opening.
pub trait MediaDevice: Send {
    fn open(&mut self, constraints: &MediaConstraints) -> Result<StreamInfo, MediaAccessError>;

    /// The current frame, or `None` when nothing decodable is available yet.
    fn read_frame(&mut self) -> Option<Frame>;

    fn release(&mut self);

    fn is_open(&self) -> bool;
}

use crate::media::domain::media_device::{MediaAccessError, MediaConstraints, MediaDevice};
use crate::sampling::domain::video_frame_source::VideoFrameSource;
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Owns the capture device and its enabled/disabled state.
///
/// Every path out of the enabled state releases the device: `disable`,
/// `toggle`, a failed `enable`, and drop.
pub struct MediaSourceController {
    device: Box<dyn MediaDevice>,
    constraints: MediaConstraints,
    stream: Option<StreamInfo>,
}

impl MediaSourceController {
    pub fn new(device: Box<dyn MediaDevice>, constraints: MediaConstraints) -> Self {
        Self {
            device,
            constraints,
            stream: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.stream.is_some()
    }

    /// Enabled and the device still reports an open stream.
    pub fn is_ready(&self) -> bool {
        self.is_enabled() && self.device.is_open()
    }

    /// Opens the device. A no-op when already enabled.
    ///
    /// On failure the device is released before the error is returned, so no
    /// half-open stream survives.
    pub fn enable(&mut self) -> Result<&StreamInfo, MediaAccessError> {
        if self.stream.is_none() {
            match self.device.open(&self.constraints) {
                Ok(info) => {
                    log::info!(
                        "Camera enabled: {}x{} @ {:.1} fps",
                        info.width,
                        info.height,
                        info.fps
                    );
                    self.stream = Some(info);
                }
                Err(e) => {
                    self.device.release();
                    log::warn!("Camera could not be enabled: {e}");
                    return Err(e);
                }
            }
        }
        self.stream.as_ref().ok_or_else(|| {
            MediaAccessError::Backend("stream vanished after open".to_string())
        })
    }

    pub fn disable(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Camera disabled");
        }
        self.device.release();
    }

    /// Flips the camera state; returns whether it is now enabled.
    pub fn toggle(&mut self) -> Result<bool, MediaAccessError> {
        if self.is_enabled() {
            self.disable();
            Ok(false)
        } else {
            self.enable().map(|_| true)
        }
    }
}

impl VideoFrameSource for MediaSourceController {
    fn is_streaming(&self) -> bool {
        self.is_ready()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if !self.is_enabled() {
            return None;
        }
        self.device.read_frame().filter(Frame::is_decodable)
    }

    fn release(&mut self) {
        self.disable();
    }
}

impl Drop for MediaSourceController {
    fn drop(&mut self) {
        self.disable();
    }
}

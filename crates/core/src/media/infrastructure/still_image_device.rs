use std::path::PathBuf;

use crate::media::domain::media_device::{MediaAccessError, MediaConstraints, MediaDevice};
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Presents one image file as a camera that never changes.
///
/// Every read returns the same picture with a fresh sequence number, which
/// lets the sampling loop run headless against a fixed input.
pub struct StillImageDevice {
    path: PathBuf,
    image: Option<image::RgbImage>,
    sequence: u64,
}

impl StillImageDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: None,
            sequence: 0,
        }
    }
}

impl MediaDevice for StillImageDevice {
    fn open(&mut self, constraints: &MediaConstraints) -> Result<StreamInfo, MediaAccessError> {
        let decoded = image::open(&self.path).map_err(|e| match e {
            image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                MediaAccessError::PermissionDenied(self.path.display().to_string())
            }
            image::ImageError::IoError(_) => {
                MediaAccessError::DeviceUnavailable(self.path.display().to_string())
            }
            other => MediaAccessError::Backend(format!("{}: {other}", self.path.display())),
        })?;

        let mut rgb = decoded.to_rgb8();
        if let (Some(w), Some(h)) = (constraints.width, constraints.height) {
            rgb = image::imageops::resize(&rgb, w, h, image::imageops::FilterType::Triangle);
        }

        let info = StreamInfo {
            width: rgb.width(),
            height: rgb.height(),
            fps: 0.0,
            source: Some(self.path.clone()),
            has_audio: false,
        };
        self.image = Some(rgb);
        Ok(info)
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let image = self.image.as_ref()?;
        self.sequence += 1;
        Some(Frame::from_rgb_image(image.clone(), self.sequence))
    }

    fn release(&mut self) {
        self.image = None;
    }

    fn is_open(&self) -> bool {
        self.image.is_some()
    }
}

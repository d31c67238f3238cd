use std::path::PathBuf;

/// Properties of an opened media stream, reported by the device on open.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Device node, file path or other locator the stream was opened from.
    pub source: Option<PathBuf>,
    pub has_audio: bool,
}

impl StreamInfo {
    /// Frame interval implied by `fps`, or `None` for still sources.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        if self.fps > 0.0 && self.fps.is_finite() {
            Some(std::time::Duration::from_secs_f64(1.0 / self.fps))
        } else {
            None
        }
    }
}

use crate::shared::frame::Frame;

/// The live picture the sampling loop reads from.
pub trait VideoFrameSource: Send {
    /// Camera enabled and its stream open.
    fn is_streaming(&self) -> bool;

    /// The current decodable frame; `None` while dimensions or data are not
    /// available yet.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Releases the underlying device. Idempotent.
    fn release(&mut self);
}

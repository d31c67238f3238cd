use std::time::Duration;

/// Handle for one requested tick, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequest(pub u64);

/// Per-refresh tick source with explicit cancellation.
///
/// Each `request_frame` asks for exactly one future tick. A tick fires at
/// most once and stops counting as pending when it fires or is cancelled.
pub trait FrameScheduler: Send {
    fn request_frame(&mut self) -> FrameRequest;

    /// Cancelling an unknown or already fired request does nothing.
    fn cancel_frame(&mut self, request: FrameRequest);

    fn pending(&self) -> usize;

    /// Blocks up to `timeout` for the next due tick. Returns `None` at once
    /// when nothing is pending.
    fn wait_frame(&mut self, timeout: Duration) -> Option<FrameRequest>;
}

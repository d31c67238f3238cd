use std::collections::VecDeque;
use std::time::Duration;

use crate::sampling::domain::frame_scheduler::{FrameRequest, FrameScheduler};
use crate::shared::clock::ManualClock;

/// Fires requests in order without waiting, advancing a shared
/// [`ManualClock`] by one refresh interval per fired tick.
///
/// Drives the loop in simulated time: in tests, and for file sources where
/// frames should be sampled at their stream timestamps rather than in real
/// time.
pub struct ManualFrameScheduler {
    clock: ManualClock,
    interval: Duration,
    queue: VecDeque<FrameRequest>,
    next_id: u64,
}

impl ManualFrameScheduler {
    pub fn new(clock: ManualClock, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            queue: VecDeque::new(),
            next_id: 0,
        }
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.queue.push_back(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.queue.retain(|r| *r != request);
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn wait_frame(&mut self, _timeout: Duration) -> Option<FrameRequest> {
        let request = self.queue.pop_front()?;
        self.clock.advance(self.interval);
        Some(request)
    }
}

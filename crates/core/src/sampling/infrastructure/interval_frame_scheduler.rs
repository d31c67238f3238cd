use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use crate::sampling::domain::frame_scheduler::{FrameRequest, FrameScheduler};
use crate::shared::constants::DEFAULT_REFRESH_INTERVAL;

/// Real-time tick source aligned to a fixed refresh grid.
///
/// Stands in for a display's redraw callback: a request made anywhere
/// inside one refresh interval fires at the start of the next one.
pub struct IntervalFrameScheduler {
    origin: Instant,
    interval: Duration,
    pending: BTreeSet<FrameRequest>,
    next_id: u64,
}

impl IntervalFrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval: interval.max(Duration::from_millis(1)),
            pending: BTreeSet::new(),
            next_id: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start of the next refresh slot strictly after `now`.
    fn next_boundary(&self, now: Instant) -> Instant {
        let since = now.duration_since(self.origin).as_nanos();
        let step = self.interval.as_nanos();
        let slots = since / step + 1;
        let offset = u64::try_from(slots * step).unwrap_or(u64::MAX);
        self.origin + Duration::from_nanos(offset)
    }
}

impl Default for IntervalFrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

impl FrameScheduler for IntervalFrameScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending.insert(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.pending.remove(&request);
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn wait_frame(&mut self, timeout: Duration) -> Option<FrameRequest> {
        let first = *self.pending.first()?;
        let now = Instant::now();
        let due = self.next_boundary(now);
        let wait = due - now;
        if wait > timeout {
            thread::sleep(timeout);
            return None;
        }
        thread::sleep(wait);
        self.pending.remove(&first);
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_immediately_when_nothing_pending() {
        let mut scheduler = IntervalFrameScheduler::new(Duration::from_millis(16));
        let start = Instant::now();
        assert_eq!(scheduler.wait_frame(Duration::from_secs(5)), None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_fires_within_one_interval() {
        let mut scheduler = IntervalFrameScheduler::new(Duration::from_millis(10));
        let request = scheduler.request_frame();
        assert_eq!(scheduler.wait_frame(Duration::from_millis(100)), Some(request));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_short_timeout_leaves_request_pending() {
        let mut scheduler = IntervalFrameScheduler::new(Duration::from_secs(3600));
        scheduler.request_frame();
        assert_eq!(scheduler.wait_frame(Duration::from_millis(1)), None);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_cancel_removes_pending() {
        let mut scheduler = IntervalFrameScheduler::default();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        scheduler.cancel_frame(a);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.wait_frame(Duration::from_millis(100)), Some(b));
    }

    #[test]
    fn test_next_boundary_is_on_grid() {
        let scheduler = IntervalFrameScheduler::new(Duration::from_millis(10));
        let now = scheduler.origin + Duration::from_millis(25);
        let due = scheduler.next_boundary(now);
        assert_eq!(due - scheduler.origin, Duration::from_millis(30));
    }
}

use std::time::Duration;

/// Lets one attempt through per `period` of clock time.
///
/// The first attempt after construction or [`reset`](Self::reset) always
/// passes.
pub struct ThrottleGate {
    period: Duration,
    last_attempt: Option<Duration>,
}

impl ThrottleGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_attempt: None,
        }
    }

    /// Records `now` as the last attempt and returns true if at least one
    /// period has passed since the previous one.
    pub fn try_pass(&mut self, now: Duration) -> bool {
        match self.last_attempt {
            Some(last) if now.saturating_sub(last) < self.period => false,
            _ => {
                self.last_attempt = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_attempt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_attempt_passes() {
        let mut gate = ThrottleGate::new(ms(333));
        assert!(gate.try_pass(ms(5)));
    }

    #[rstest]
    #[case(ms(16), false)]
    #[case(ms(332), false)]
    #[case(ms(333), true)]
    #[case(ms(1000), true)]
    fn test_period_boundary(#[case] after: Duration, #[case] passes: bool) {
        let mut gate = ThrottleGate::new(ms(333));
        assert!(gate.try_pass(ms(0)));
        assert_eq!(gate.try_pass(after), passes);
    }

    #[test]
    fn test_blocked_attempts_do_not_move_the_window() {
        let mut gate = ThrottleGate::new(ms(100));
        assert!(gate.try_pass(ms(0)));
        assert!(!gate.try_pass(ms(60)));
        assert!(gate.try_pass(ms(100)));
    }

    #[test]
    fn test_reset_reopens_gate() {
        let mut gate = ThrottleGate::new(ms(333));
        assert!(gate.try_pass(ms(0)));
        gate.reset();
        assert!(gate.try_pass(ms(1)));
    }

    #[test]
    fn test_clock_going_backwards_is_throttled() {
        let mut gate = ThrottleGate::new(ms(333));
        assert!(gate.try_pass(ms(500)));
        assert!(!gate.try_pass(ms(100)));
    }
}

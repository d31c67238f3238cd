use std::time::Duration;

use crate::shared::constants::DEFAULT_THROTTLE;

/// Tuning for the emotion sampling loop.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    /// Minimum gap between detection attempts.
    pub throttle: Duration,
    /// Drop results older than the newest one already published.
    pub discard_stale: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
            discard_stale: true,
        }
    }
}

impl SamplerConfig {
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_discard_stale(mut self, discard: bool) -> Self {
        self.discard_stale = discard;
        self
    }
}

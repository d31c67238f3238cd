use std::time::Instant;

/// What one scheduler tick ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Loop inactive; no further tick was scheduled.
    Stopped,
    /// No decodable frame yet.
    FrameNotReady,
    /// Too soon after the previous attempt.
    Throttled,
    /// A result was published.
    Sampled { face_detected: bool },
    /// The detector produced nothing this time.
    NoResult,
    /// A result came back but a newer one was already published.
    Stale,
}

/// Observer for sampling-loop activity.
///
/// Lets the CLI, tests and any other host watch the loop without the loop
/// knowing where the numbers go.
pub trait SamplingLogger: Send {
    fn tick(&mut self, outcome: TickOutcome);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// End-of-run report, if this logger keeps one.
    fn summary(&self) -> Option<String> {
        None
    }
}

/// Discards everything.
pub struct NullSamplingLogger;

impl SamplingLogger for NullSamplingLogger {
    fn tick(&mut self, _outcome: TickOutcome) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
}

/// Counts tick outcomes and detection latency for an end-of-run summary.
#[derive(Debug)]
pub struct SummarySamplingLogger {
    start_time: Instant,
    pub ticks: usize,
    pub stopped: usize,
    pub frame_not_ready: usize,
    pub throttled: usize,
    pub with_face: usize,
    pub without_face: usize,
    pub no_result: usize,
    pub stale: usize,
    detect_ms: Vec<f64>,
}

impl SummarySamplingLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: 0,
            stopped: 0,
            frame_not_ready: 0,
            throttled: 0,
            with_face: 0,
            without_face: 0,
            no_result: 0,
            stale: 0,
            detect_ms: Vec::new(),
        }
    }

    /// Number of times the detector was actually invoked.
    pub fn detections(&self) -> usize {
        self.with_face + self.without_face + self.no_result + self.stale
    }

    pub fn average_detect_ms(&self) -> Option<f64> {
        if self.detect_ms.is_empty() {
            None
        } else {
            Some(self.detect_ms.iter().sum::<f64>() / self.detect_ms.len() as f64)
        }
    }
}

impl Default for SummarySamplingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingLogger for SummarySamplingLogger {
    fn tick(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Stopped => self.stopped += 1,
            TickOutcome::FrameNotReady => self.frame_not_ready += 1,
            TickOutcome::Throttled => self.throttled += 1,
            TickOutcome::Sampled { face_detected: true } => self.with_face += 1,
            TickOutcome::Sampled { face_detected: false } => self.without_face += 1,
            TickOutcome::NoResult => self.no_result += 1,
            TickOutcome::Stale => self.stale += 1,
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        if stage == "detect" {
            self.detect_ms.push(duration_ms);
        }
    }

    fn summary(&self) -> Option<String> {
        if self.ticks == 0 {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Sampling summary ({} ticks, {elapsed:.1}s):",
            self.ticks
        )];
        lines.push(format!(
            "  detections: {} ({} with face, {} without, {} failed, {} stale)",
            self.detections(),
            self.with_face,
            self.without_face,
            self.no_result,
            self.stale
        ));
        lines.push(format!(
            "  skipped: {} throttled, {} frame not ready",
            self.throttled, self.frame_not_ready
        ));
        if let Some(avg) = self.average_detect_ms() {
            lines.push(format!("  detect: avg {avg:.1}ms"));
        }
        if elapsed > 0.0 {
            lines.push(format!(
                "  rate: {:.2} samples/s",
                self.detections() as f64 / elapsed
            ));
        }
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_has_no_summary() {
        let mut logger = NullSamplingLogger;
        logger.tick(TickOutcome::Throttled);
        logger.timing("detect", 12.0);
        assert!(logger.summary().is_none());
    }

    #[test]
    fn test_empty_summary_is_none() {
        assert!(SummarySamplingLogger::new().summary().is_none());
    }

    #[test]
    fn test_counts_each_outcome() {
        let mut logger = SummarySamplingLogger::new();
        logger.tick(TickOutcome::Throttled);
        logger.tick(TickOutcome::Throttled);
        logger.tick(TickOutcome::FrameNotReady);
        logger.tick(TickOutcome::Sampled { face_detected: true });
        logger.tick(TickOutcome::Sampled { face_detected: false });
        logger.tick(TickOutcome::NoResult);
        logger.tick(TickOutcome::Stopped);

        assert_eq!(logger.ticks, 7);
        assert_eq!(logger.throttled, 2);
        assert_eq!(logger.detections(), 3);
        assert_eq!(logger.stopped, 1);
    }

    #[test]
    fn test_average_detect_time() {
        let mut logger = SummarySamplingLogger::new();
        logger.timing("detect", 100.0);
        logger.timing("detect", 200.0);
        logger.timing("other", 999.0);
        assert_relative_eq!(logger.average_detect_ms().unwrap(), 150.0);
    }

    #[test]
    fn test_summary_mentions_detections() {
        let mut logger = SummarySamplingLogger::new();
        logger.tick(TickOutcome::Sampled { face_detected: true });
        logger.timing("detect", 42.0);
        let summary = logger.summary().unwrap();
        assert!(summary.contains("detections: 1"));
        assert!(summary.contains("avg 42.0ms"));
    }
}

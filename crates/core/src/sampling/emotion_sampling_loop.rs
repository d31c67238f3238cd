use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::emotion::domain::result_normalizer::to_emotion_state;
use crate::emotion::infrastructure::emotion_detector::EmotionDetector;
use crate::sampling::domain::frame_scheduler::{FrameRequest, FrameScheduler};
use crate::sampling::domain::sampler_config::SamplerConfig;
use crate::sampling::domain::throttle_gate::ThrottleGate;
use crate::sampling::domain::video_frame_source::VideoFrameSource;
use crate::sampling::emotion_feed::EmotionFeed;
use crate::sampling::sampling_logger::{NullSamplingLogger, SamplingLogger, TickOutcome};
use crate::shared::clock::Clock;

/// Samples the video source at a bounded rate and publishes emotion readings.
///
/// The loop runs only while the host marks it active, the source is
/// streaming and the detector is ready. Ticks come from the scheduler, one
/// per display refresh, but the detector runs at most once per throttle
/// period. Whenever one of the three conditions drops, the pending tick is
/// cancelled; when they all hold again the loop restarts with a fresh
/// throttle window.
pub struct EmotionSamplingLoop {
    detector: Arc<EmotionDetector>,
    source: Box<dyn VideoFrameSource>,
    scheduler: Box<dyn FrameScheduler>,
    clock: Arc<dyn Clock>,
    gate: ThrottleGate,
    feed: EmotionFeed,
    logger: Box<dyn SamplingLogger>,
    active: bool,
    scheduled: Option<FrameRequest>,
    last_sequence: u64,
}

impl EmotionSamplingLoop {
    pub fn new(
        detector: Arc<EmotionDetector>,
        source: Box<dyn VideoFrameSource>,
        scheduler: Box<dyn FrameScheduler>,
        clock: Arc<dyn Clock>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            detector,
            source,
            scheduler,
            clock,
            gate: ThrottleGate::new(config.throttle),
            feed: EmotionFeed::new(config.discard_stale),
            logger: Box::new(NullSamplingLogger),
            active: false,
            scheduled: None,
            last_sequence: 0,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn SamplingLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Handle for readers of the published state.
    pub fn feed(&self) -> EmotionFeed {
        self.feed.clone()
    }

    pub fn detector(&self) -> &Arc<EmotionDetector> {
        &self.detector
    }

    pub fn is_running(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn pending_ticks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Host-controlled activation flag (camera enabled and stream ready).
    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            log::debug!("Sampling loop {}", if active { "activated" } else { "deactivated" });
        }
        self.active = active;
        self.refresh();
    }

    /// Re-evaluates the run conditions, starting or stopping the tick chain.
    ///
    /// Call after anything the loop cannot observe on its own has changed,
    /// such as a background model load finishing.
    pub fn refresh(&mut self) {
        let should_run = self.should_run();
        match (should_run, self.scheduled) {
            (true, None) => {
                log::info!("Emotion sampling started");
                self.gate.reset();
                self.schedule();
            }
            (false, Some(request)) => {
                log::info!("Emotion sampling stopped");
                self.scheduler.cancel_frame(request);
                self.scheduled = None;
            }
            _ => {}
        }
        self.publish_status(should_run);
    }

    /// Handles one scheduler tick.
    ///
    /// Ticks other than the one currently scheduled are ignored, so a
    /// cancelled request that still fires does no work.
    pub fn on_frame(&mut self, request: FrameRequest) {
        if self.scheduled != Some(request) {
            log::debug!("Ignoring stale tick {}", request.0);
            return;
        }
        self.scheduled = None;

        if !self.should_run() {
            self.logger.tick(TickOutcome::Stopped);
            self.publish_status(false);
            return;
        }

        let outcome = self.sample();
        self.logger.tick(outcome);
        self.schedule();
    }

    /// Waits up to `timeout` for the next tick and handles it. Returns false
    /// when no tick fired.
    pub fn pump(&mut self, timeout: Duration) -> bool {
        match self.scheduler.wait_frame(timeout) {
            Some(request) => {
                self.on_frame(request);
                true
            }
            None => false,
        }
    }

    /// Stops sampling, releases the video source and disposes the detector.
    pub fn teardown(&mut self) {
        self.active = false;
        if let Some(request) = self.scheduled.take() {
            self.scheduler.cancel_frame(request);
        }
        self.source.release();
        self.detector.dispose();
        self.publish_status(false);
        log::info!("Emotion sampling torn down");
    }

    pub fn summary(&self) -> Option<String> {
        self.logger.summary()
    }

    fn should_run(&self) -> bool {
        self.active && self.source.is_streaming() && self.detector.is_ready()
    }

    fn schedule(&mut self) {
        self.scheduled = Some(self.scheduler.request_frame());
    }

    fn sample(&mut self) -> TickOutcome {
        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::FrameNotReady;
        };

        let now = self.clock.elapsed();
        if !self.gate.try_pass(now) {
            return TickOutcome::Throttled;
        }

        self.last_sequence += 1;
        let sequence = self.last_sequence;

        let t = Instant::now();
        let result = self.detector.detect_emotions(&frame);
        self.logger
            .timing("detect", t.elapsed().as_secs_f64() * 1000.0);

        let Some(result) = result else {
            return TickOutcome::NoResult;
        };
        let face_detected = result.face_detected;
        let (state, additional) = to_emotion_state(&result, now);
        if self.feed.publish(sequence, state, additional) {
            TickOutcome::Sampled { face_detected }
        } else {
            TickOutcome::Stale
        }
    }

    fn publish_status(&self, processing: bool) {
        self.feed.set_status(self.detector.is_ready(), processing);
    }
}

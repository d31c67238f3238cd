use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::thread;

use thiserror::Error;

use crate::emotion::domain::detection_result::DetectionResult;
use crate::emotion::domain::emotion_analyzer::{AnalyzerLoader, EmotionAnalyzer};
use crate::emotion::domain::result_normalizer::normalize;
use crate::shared::frame::Frame;

/// Lifecycle of the analyzer instance owned by an [`EmotionDetector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorState {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

#[derive(Error, Debug, Clone)]
pub enum ModelLoadError {
    #[error("failed to load emotion model: {0}")]
    Load(#[source] Arc<dyn std::error::Error + Send + Sync>),
    #[error("detector was disposed while the model was loading")]
    Cancelled,
    #[error("detector has been disposed")]
    Disposed,
}

type SharedAnalyzer = Arc<Mutex<Box<dyn EmotionAnalyzer>>>;

/// One load attempt. Every caller that joins it holds the same handle and
/// reads the same outcome, however many attempts follow.
struct Attempt {
    id: u64,
    outcome: OnceLock<Result<(), ModelLoadError>>,
}

struct Lifecycle {
    state: DetectorState,
    analyzer: Option<SharedAnalyzer>,
    attempts: u64,
    /// The attempt in flight while `Initializing`.
    pending: Option<Arc<Attempt>>,
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
}

/// Owns exactly one analyzer and guards its initialization.
///
/// Concurrent `initialize` calls join the single in-flight load instead of
/// starting another. Detection never fails loudly: an unready detector, a
/// backend error or a backend panic all come back as "no result".
///
/// The state is checked again after every blocking step, so a `dispose`
/// that lands while a load or a detection is running wins: the loaded
/// analyzer is dropped and the detection result discarded.
pub struct EmotionDetector {
    loader: Arc<dyn AnalyzerLoader>,
    shared: Arc<Shared>,
}

impl EmotionDetector {
    pub fn new(loader: Arc<dyn AnalyzerLoader>) -> Self {
        Self {
            loader,
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    state: DetectorState::Uninitialized,
                    analyzer: None,
                    attempts: 0,
                    pending: None,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.shared.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == DetectorState::Ready
    }

    /// Loads the analyzer, or waits for the load already in flight.
    ///
    /// Returns immediately when ready. On failure the detector goes back to
    /// `Uninitialized`; retrying is up to the caller.
    pub fn initialize(&self) -> Result<(), ModelLoadError> {
        let attempt = match self.start_attempt()? {
            Start::AlreadyReady => return Ok(()),
            Start::Joined(attempt) => attempt,
            Start::Started(attempt) => {
                run_attempt(&self.shared, self.loader.as_ref(), &attempt);
                attempt
            }
        };
        self.shared.wait_for(&attempt)
    }

    /// Starts loading on a background thread and returns at once.
    ///
    /// A no-op when already ready or loading. Errors surface to whoever
    /// calls [`initialize`](Self::initialize) next, and through `state()`.
    pub fn begin_initialize(&self) -> Result<(), ModelLoadError> {
        if let Start::Started(attempt) = self.start_attempt()? {
            let shared = self.shared.clone();
            let loader = self.loader.clone();
            thread::spawn(move || run_attempt(&shared, loader.as_ref(), &attempt));
        }
        Ok(())
    }

    /// Runs the analyzer on `frame` and normalizes its output.
    ///
    /// `None` means "no result this time": not ready, backend failure, or
    /// disposed mid-call. A frame without a face is still `Some`.
    pub fn detect_emotions(&self, frame: &Frame) -> Option<DetectionResult> {
        let analyzer = {
            let lifecycle = self.shared.lock();
            match (&lifecycle.state, &lifecycle.analyzer) {
                (DetectorState::Ready, Some(analyzer)) => analyzer.clone(),
                (state, _) => {
                    log::warn!("Emotion detector not ready ({state:?}); skipping frame");
                    return None;
                }
            }
        };

        let outcome = {
            let mut analyzer = analyzer.lock().unwrap_or_else(|e| e.into_inner());
            panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(frame)))
        };

        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                log::warn!("Emotion analysis failed on frame {}: {e}", frame.sequence());
                return None;
            }
            Err(_) => {
                log::error!("Emotion analyzer panicked on frame {}", frame.sequence());
                return None;
            }
        };

        if !self.is_ready() {
            log::debug!("Detector disposed during analysis; discarding result");
            return None;
        }
        Some(normalize(raw.as_ref()))
    }

    /// Releases the analyzer. Any in-flight load is abandoned.
    pub fn dispose(&self) {
        let mut lifecycle = self.shared.lock();
        if lifecycle.state == DetectorState::Disposed {
            return;
        }
        log::info!("Disposing emotion detector (was {:?})", lifecycle.state);
        lifecycle.state = DetectorState::Disposed;
        lifecycle.analyzer = None;
        if let Some(attempt) = lifecycle.pending.take() {
            let _ = attempt.outcome.set(Err(ModelLoadError::Cancelled));
        }
        drop(lifecycle);
        self.shared.changed.notify_all();
    }

    fn start_attempt(&self) -> Result<Start, ModelLoadError> {
        let mut lifecycle = self.shared.lock();
        match lifecycle.state {
            DetectorState::Ready => Ok(Start::AlreadyReady),
            DetectorState::Disposed => Err(ModelLoadError::Disposed),
            DetectorState::Initializing => match &lifecycle.pending {
                Some(attempt) => Ok(Start::Joined(attempt.clone())),
                None => Err(ModelLoadError::Cancelled),
            },
            DetectorState::Uninitialized => {
                lifecycle.attempts += 1;
                let attempt = Arc::new(Attempt {
                    id: lifecycle.attempts,
                    outcome: OnceLock::new(),
                });
                lifecycle.state = DetectorState::Initializing;
                lifecycle.pending = Some(attempt.clone());
                log::info!("Loading emotion model (attempt {})", attempt.id);
                Ok(Start::Started(attempt))
            }
        }
    }
}

enum Start {
    AlreadyReady,
    Joined(Arc<Attempt>),
    Started(Arc<Attempt>),
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until `attempt` has settled and returns how it ended.
    fn wait_for(&self, attempt: &Attempt) -> Result<(), ModelLoadError> {
        let _settled = self
            .changed
            .wait_while(self.lock(), |_| attempt.outcome.get().is_none())
            .unwrap_or_else(|e| e.into_inner());
        attempt
            .outcome
            .get()
            .cloned()
            .unwrap_or(Err(ModelLoadError::Cancelled))
    }

    fn finish(
        &self,
        attempt: &Arc<Attempt>,
        loaded: Result<Box<dyn EmotionAnalyzer>, ModelLoadError>,
    ) {
        let mut lifecycle = self.lock();
        let current = lifecycle.state == DetectorState::Initializing
            && lifecycle.pending.as_ref().is_some_and(|p| Arc::ptr_eq(p, attempt));
        if current {
            lifecycle.pending = None;
        }

        let result = match loaded {
            _ if !current => {
                log::info!(
                    "Discarding model load attempt {}: detector was disposed",
                    attempt.id
                );
                Err(ModelLoadError::Cancelled)
            }
            Ok(analyzer) => {
                lifecycle.state = DetectorState::Ready;
                lifecycle.analyzer = Some(Arc::new(Mutex::new(analyzer)));
                log::info!("Emotion model ready");
                Ok(())
            }
            Err(e) => {
                lifecycle.state = DetectorState::Uninitialized;
                log::warn!("{e}");
                Err(e)
            }
        };

        let _ = attempt.outcome.set(result);
        drop(lifecycle);
        self.changed.notify_all();
    }
}

/// Runs the loader outside the lock and records the outcome.
fn run_attempt(shared: &Shared, loader: &dyn AnalyzerLoader, attempt: &Arc<Attempt>) {
    let loaded = match panic::catch_unwind(AssertUnwindSafe(|| loader.load())) {
        Ok(Ok(analyzer)) => Ok(analyzer),
        Ok(Err(e)) => Err(ModelLoadError::Load(Arc::from(e))),
        Err(_) => {
            let e: Box<dyn std::error::Error + Send + Sync> = "model loader panicked".into();
            Err(ModelLoadError::Load(Arc::from(e)))
        }
    };
    shared.finish(attempt, loaded);
}

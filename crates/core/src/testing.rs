//! Scripted fakes shared by unit tests across modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::emotion::domain::emotion_analyzer::{AnalyzerLoader, EmotionAnalyzer, RawFaceAnalysis};
use crate::media::domain::media_device::{MediaAccessError, MediaConstraints, MediaDevice};
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

pub fn frame(sequence: u64) -> Frame {
    Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, 3, sequence)
}

#[derive(Clone, Debug)]
pub enum AnalyzerStep {
    Face(RawFaceAnalysis),
    NoFace,
    Fail,
    Panic,
}

impl AnalyzerStep {
    pub fn face(scores: &[(&str, f32)]) -> Self {
        AnalyzerStep::Face(RawFaceAnalysis::from_scores(scores.iter().copied()))
    }
}

/// Plays back `steps` in order, then reports "no face" forever.
pub struct ScriptedAnalyzer {
    steps: VecDeque<AnalyzerStep>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedAnalyzer {
    pub fn new(steps: Vec<AnalyzerStep>) -> Self {
        Self {
            steps: steps.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl EmotionAnalyzer for ScriptedAnalyzer {
    fn analyze(
        &mut self,
        _frame: &Frame,
    ) -> Result<Option<RawFaceAnalysis>, Box<dyn std::error::Error>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front().unwrap_or(AnalyzerStep::NoFace) {
            AnalyzerStep::Face(raw) => Ok(Some(raw)),
            AnalyzerStep::NoFace => Ok(None),
            AnalyzerStep::Fail => Err("scripted analyzer failure".into()),
            AnalyzerStep::Panic => panic!("scripted analyzer panic"),
        }
    }
}

enum LoaderMode {
    Succeed,
    Fail,
    Panic,
}

/// Hands out one scripted analyzer, optionally after a release signal.
pub struct ScriptedLoader {
    mode: LoaderMode,
    analyzer: Mutex<Option<ScriptedAnalyzer>>,
    gate: Option<Receiver<()>>,
    loading: AtomicBool,
    pub loads: AtomicUsize,
}

impl ScriptedLoader {
    fn with_mode(mode: LoaderMode, analyzer: Option<ScriptedAnalyzer>) -> Self {
        Self {
            mode,
            analyzer: Mutex::new(analyzer),
            gate: None,
            loading: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(analyzer: ScriptedAnalyzer) -> Self {
        Self::with_mode(LoaderMode::Succeed, Some(analyzer))
    }

    pub fn failing() -> Self {
        Self::with_mode(LoaderMode::Fail, None)
    }

    pub fn panicking() -> Self {
        Self::with_mode(LoaderMode::Panic, None)
    }

    /// Succeeds only once a value is sent on the returned channel.
    pub fn gated(analyzer: ScriptedAnalyzer) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut loader = Self::succeeding(analyzer);
        loader.gate = Some(rx);
        (loader, tx)
    }

    /// Fails only once a value is sent on the returned channel.
    pub fn gated_failing() -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut loader = Self::failing();
        loader.gate = Some(rx);
        (loader, tx)
    }

    pub fn wait_until_loading(&self) {
        while !self.loading.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl AnalyzerLoader for ScriptedLoader {
    fn load(&self) -> Result<Box<dyn EmotionAnalyzer>, Box<dyn std::error::Error + Send + Sync>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.loading.store(true, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| "gate dropped")?;
        }
        match self.mode {
            LoaderMode::Succeed => {
                let analyzer = self
                    .analyzer
                    .lock()
                    .unwrap()
                    .take()
                    .unwrap_or_else(|| ScriptedAnalyzer::new(vec![]));
                Ok(Box::new(analyzer))
            }
            LoaderMode::Fail => Err("network unreachable".into()),
            LoaderMode::Panic => panic!("scripted loader panic"),
        }
    }
}

/// Counters observable after the device has been moved into a controller.
#[derive(Default)]
pub struct DeviceProbe {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub open: AtomicBool,
    pub reads: AtomicUsize,
}

/// In-memory camera. The first `blank_reads` reads yield no frame.
pub struct FakeMediaDevice {
    pub probe: Arc<DeviceProbe>,
    fail_with: Option<MediaAccessError>,
    blank_reads: usize,
    sequence: u64,
}

impl FakeMediaDevice {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(DeviceProbe::default()),
            fail_with: None,
            blank_reads: 0,
            sequence: 0,
        }
    }

    pub fn failing(error: MediaAccessError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new()
        }
    }

    pub fn with_blank_reads(mut self, count: usize) -> Self {
        self.blank_reads = count;
        self
    }
}

impl MediaDevice for FakeMediaDevice {
    fn open(&mut self, constraints: &MediaConstraints) -> Result<StreamInfo, MediaAccessError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.probe.open.store(true, Ordering::SeqCst);
        Ok(StreamInfo {
            width: constraints.width.unwrap_or(8),
            height: constraints.height.unwrap_or(8),
            fps: 30.0,
            source: None,
            has_audio: constraints.audio,
        })
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.is_open() {
            return None;
        }
        let reads = self.probe.reads.fetch_add(1, Ordering::SeqCst);
        if reads < self.blank_reads {
            return None;
        }
        self.sequence += 1;
        Some(frame(self.sequence))
    }

    fn release(&mut self) {
        if self.probe.open.swap(false, Ordering::SeqCst) {
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.probe.open.load(Ordering::SeqCst)
    }
}

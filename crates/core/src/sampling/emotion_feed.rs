use std::sync::{Arc, Mutex, RwLock};

use crossbeam_channel::{Receiver, Sender};

use crate::emotion::domain::emotion_state::{AdditionalData, EmotionState};

/// Everything a presentation layer needs, as one immutable value.
#[derive(Clone, Debug, PartialEq)]
pub struct EmotionSnapshot {
    pub emotion: Arc<EmotionState>,
    pub additional: AdditionalData,
    pub is_initialized: bool,
    /// Camera active and detector initialized.
    pub is_processing: bool,
    /// Sequence number of the sample behind `emotion`; 0 before the first.
    pub sequence: u64,
}

impl EmotionSnapshot {
    fn initial() -> Self {
        Self {
            emotion: Arc::new(EmotionState::initial()),
            additional: AdditionalData::default(),
            is_initialized: false,
            is_processing: false,
            sequence: 0,
        }
    }
}

struct FeedInner {
    latest: RwLock<EmotionSnapshot>,
    subscribers: Mutex<Vec<Sender<EmotionSnapshot>>>,
    discard_stale: bool,
}

/// Latest-value store with change notifications.
///
/// Readers either poll [`latest`](Self::latest) or hold a receiver from
/// [`subscribe`](Self::subscribe). Clones share the same state.
#[derive(Clone)]
pub struct EmotionFeed {
    inner: Arc<FeedInner>,
}

impl EmotionFeed {
    pub fn new(discard_stale: bool) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                latest: RwLock::new(EmotionSnapshot::initial()),
                subscribers: Mutex::new(Vec::new()),
                discard_stale,
            }),
        }
    }

    pub fn latest(&self) -> EmotionSnapshot {
        self.inner
            .latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Receives every snapshot published after this call.
    pub fn subscribe(&self) -> Receiver<EmotionSnapshot> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock_subscribers().push(tx);
        rx
    }

    /// Replaces the published reading. Returns false if it was discarded as
    /// stale.
    pub fn publish(&self, sequence: u64, state: EmotionState, additional: AdditionalData) -> bool {
        let snapshot = {
            let mut latest = self.inner.latest.write().unwrap_or_else(|e| e.into_inner());
            if self.inner.discard_stale && sequence <= latest.sequence {
                log::debug!(
                    "Discarding stale sample {sequence} (latest is {})",
                    latest.sequence
                );
                return false;
            }
            latest.emotion = Arc::new(state);
            latest.additional = additional;
            latest.sequence = latest.sequence.max(sequence);
            latest.clone()
        };
        self.broadcast(snapshot);
        true
    }

    /// Updates the two status flags; notifies only when they change.
    pub fn set_status(&self, is_initialized: bool, is_processing: bool) {
        let snapshot = {
            let mut latest = self.inner.latest.write().unwrap_or_else(|e| e.into_inner());
            if latest.is_initialized == is_initialized && latest.is_processing == is_processing {
                return;
            }
            latest.is_initialized = is_initialized;
            latest.is_processing = is_processing;
            latest.clone()
        };
        self.broadcast(snapshot);
    }

    fn broadcast(&self, snapshot: EmotionSnapshot) {
        self.lock_subscribers()
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Sender<EmotionSnapshot>>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

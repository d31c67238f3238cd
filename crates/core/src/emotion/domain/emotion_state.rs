use std::time::Duration;

use serde::Serialize;

use super::detection_result::Gender;
use super::emotion_category::{EmotionCategory, EmotionScores};

/// Presentational tone derived from the dominant emotion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTone {
    #[default]
    Balanced,
    Positive,
    Low,
    Tense,
    Alert,
    Uneasy,
    Averse,
}

impl EmotionTone {
    pub fn label(self) -> &'static str {
        match self {
            EmotionTone::Balanced => "balanced",
            EmotionTone::Positive => "positive",
            EmotionTone::Low => "low",
            EmotionTone::Tense => "tense",
            EmotionTone::Alert => "alert",
            EmotionTone::Uneasy => "uneasy",
            EmotionTone::Averse => "averse",
        }
    }
}

/// The published emotion reading. Replaced wholesale on every sample.
///
/// `confidence` always equals `scores.get(dominant)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmotionState {
    pub dominant: EmotionCategory,
    pub confidence: f32,
    pub scores: EmotionScores,
    pub tone: EmotionTone,
    /// Sampling-clock time at which the frame was captured.
    pub timestamp: Duration,
}

impl EmotionState {
    /// State shown before any sample exists.
    pub fn initial() -> Self {
        Self {
            dominant: EmotionCategory::Neutral,
            confidence: 0.0,
            scores: EmotionScores::certain(EmotionCategory::Neutral),
            tone: EmotionTone::Balanced,
            timestamp: Duration::ZERO,
        }
    }
}

/// Facial attributes published alongside the emotion reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AdditionalData {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub face_detected: bool,
}

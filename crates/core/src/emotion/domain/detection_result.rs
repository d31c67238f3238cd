use serde::Serialize;

use super::emotion_category::{EmotionCategory, EmotionScores};

/// Coarse gender tag reported by some analyzers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn from_label(label: &str) -> Option<Gender> {
        match label.trim().to_ascii_lowercase().as_str() {
            "male" | "man" | "m" => Some(Gender::Male),
            "female" | "woman" | "f" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// One normalized analysis of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub emotions: EmotionScores,
    pub dominant: EmotionCategory,
    pub confidence: f32,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub face_detected: bool,
}

impl DetectionResult {
    /// The result for a frame in which no face was found.
    pub fn no_face() -> Self {
        Self {
            emotions: EmotionScores::certain(EmotionCategory::Neutral),
            dominant: EmotionCategory::Neutral,
            confidence: 0.0,
            age: None,
            gender: None,
            face_detected: false,
        }
    }
}

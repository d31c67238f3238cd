use crate::shared::frame::Frame;

/// Raw output of an analyzer for the most prominent face in a frame.
///
/// Labels are in the backend's own vocabulary; mapping onto
/// [`EmotionCategory`](super::emotion_category::EmotionCategory) happens in
/// the result normalizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawFaceAnalysis {
    pub scores: Vec<(String, f32)>,
    pub age: Option<f32>,
    pub gender: Option<String>,
}

impl RawFaceAnalysis {
    pub fn from_scores<'a>(scores: impl IntoIterator<Item = (&'a str, f32)>) -> Self {
        Self {
            scores: scores
                .into_iter()
                .map(|(label, score)| (label.to_string(), score))
                .collect(),
            age: None,
            gender: None,
        }
    }
}

/// Domain interface for the face-analysis capability.
///
/// `Ok(None)` means the frame contains no face. Implementations may be slow
/// (hundreds of milliseconds) and stateful, hence `&mut self`.
pub trait EmotionAnalyzer: Send {
    fn analyze(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<RawFaceAnalysis>, Box<dyn std::error::Error>>;
}

/// Builds an [`EmotionAnalyzer`], typically by fetching model artifacts.
///
/// Called off the sampling thread; may block for seconds.
pub trait AnalyzerLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn EmotionAnalyzer>, Box<dyn std::error::Error + Send + Sync>>;
}

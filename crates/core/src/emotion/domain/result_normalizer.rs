use std::time::Duration;

use super::detection_result::{DetectionResult, Gender};
use super::emotion_analyzer::RawFaceAnalysis;
use super::emotion_category::{EmotionCategory, EmotionScores};
use super::emotion_state::{AdditionalData, EmotionState, EmotionTone};

/// Maps one analyzer output onto a [`DetectionResult`].
///
/// `None` (no face) yields [`DetectionResult::no_face`]. Unknown labels are
/// dropped; a label seen twice keeps its last score.
pub fn normalize(raw: Option<&RawFaceAnalysis>) -> DetectionResult {
    let Some(raw) = raw else {
        return DetectionResult::no_face();
    };

    let mut emotions = EmotionScores::zeroed();
    for (label, score) in &raw.scores {
        match EmotionCategory::from_label(label) {
            Some(category) => emotions.set(category, *score),
            None => log::debug!("Ignoring unmapped emotion label '{label}'"),
        }
    }

    let (dominant, confidence) = dominant_emotion(&emotions);
    DetectionResult {
        emotions,
        dominant,
        confidence,
        age: raw
            .age
            .filter(|a| a.is_finite() && *a >= 0.0)
            .map(|a| a.round() as u32),
        gender: raw.gender.as_deref().and_then(Gender::from_label),
        face_detected: true,
    }
}

/// Highest-scoring category, scanning in [`EmotionCategory::ALL`] order.
///
/// Only a strictly greater score replaces the current pick, so the earliest
/// category wins ties. Returns the pick together with its exact score.
pub fn dominant_emotion(scores: &EmotionScores) -> (EmotionCategory, f32) {
    let mut best = EmotionCategory::ALL[0];
    let mut best_score = scores.get(best);
    for (category, score) in scores.iter().skip(1) {
        if score > best_score {
            best = category;
            best_score = score;
        }
    }
    (best, best_score)
}

/// Converts a detection into the published state and side data.
///
/// A frame without a face always publishes neutral with zero confidence,
/// whatever scores the result carries.
pub fn to_emotion_state(
    result: &DetectionResult,
    timestamp: Duration,
) -> (EmotionState, AdditionalData) {
    let (dominant, confidence, scores) = if result.face_detected {
        (result.dominant, result.emotions.get(result.dominant), result.emotions)
    } else {
        let none = DetectionResult::no_face();
        (none.dominant, none.confidence, none.emotions)
    };

    let state = EmotionState {
        dominant,
        confidence,
        scores,
        tone: tone_for(dominant),
        timestamp,
    };
    let additional = AdditionalData {
        age: result.age.filter(|_| result.face_detected),
        gender: result.gender.filter(|_| result.face_detected),
        face_detected: result.face_detected,
    };
    (state, additional)
}

/// Lookup table from category to tone. Total over the closed set.
const TONES: &[(EmotionCategory, EmotionTone)] = &[
    (EmotionCategory::Happy, EmotionTone::Positive),
    (EmotionCategory::Sad, EmotionTone::Low),
    (EmotionCategory::Angry, EmotionTone::Tense),
    (EmotionCategory::Surprised, EmotionTone::Alert),
    (EmotionCategory::Fearful, EmotionTone::Uneasy),
    (EmotionCategory::Disgust, EmotionTone::Averse),
];

/// Tone for `category`; anything not in the table (neutral included) is
/// [`EmotionTone::Balanced`].
pub fn tone_for(category: EmotionCategory) -> EmotionTone {
    TONES
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, tone)| *tone)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn raw(scores: &[(&str, f32)]) -> RawFaceAnalysis {
        RawFaceAnalysis::from_scores(scores.iter().copied())
    }

    #[test]
    fn test_no_face_normalizes_to_neutral_zero() {
        let result = normalize(None);
        let (state, extra) = to_emotion_state(&result, Duration::from_millis(5));
        assert_eq!(state.dominant, EmotionCategory::Neutral);
        assert_relative_eq!(state.confidence, 0.0);
        assert_relative_eq!(state.scores.get(EmotionCategory::Neutral), 1.0);
        for category in &EmotionCategory::ALL[1..] {
            assert_relative_eq!(state.scores.get(*category), 0.0);
        }
        assert!(!extra.face_detected);
        assert_eq!(state.timestamp, Duration::from_millis(5));
    }

    #[test]
    fn test_face_not_detected_overrides_carried_scores() {
        let mut result = normalize(Some(&raw(&[("happy", 0.9)])));
        result.face_detected = false;
        result.age = Some(30);
        let (state, extra) = to_emotion_state(&result, Duration::ZERO);
        assert_eq!(state.dominant, EmotionCategory::Neutral);
        assert_relative_eq!(state.confidence, 0.0);
        assert!(extra.age.is_none());
    }

    #[test]
    fn test_picks_maximum_and_confidence_equals_its_score() {
        let result = normalize(Some(&raw(&[("happy", 0.8), ("neutral", 0.1), ("sad", 0.1)])));
        assert_eq!(result.dominant, EmotionCategory::Happy);
        assert_relative_eq!(result.confidence, 0.8);
        assert_eq!(result.confidence, result.emotions.get(result.dominant));
        assert!(result.face_detected);
    }

    #[rstest]
    #[case::happy_sad(&[("sad", 0.5), ("happy", 0.5)], EmotionCategory::Happy)]
    #[case::neutral_first(&[("disgust", 0.3), ("neutral", 0.3)], EmotionCategory::Neutral)]
    #[case::all_zero(&[], EmotionCategory::Neutral)]
    #[case::fear_disgust(&[("disgusted", 0.4), ("fearful", 0.4)], EmotionCategory::Fearful)]
    fn test_ties_resolve_to_earliest_category(
        #[case] scores: &[(&str, f32)],
        #[case] expected: EmotionCategory,
    ) {
        let input = raw(scores);
        for _ in 0..5 {
            assert_eq!(normalize(Some(&input)).dominant, expected);
        }
    }

    #[test]
    fn test_dominant_is_never_beaten() {
        let grids: [[f32; 7]; 4] = [
            [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7],
            [0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1],
            [0.0, 0.9, 0.0, 0.9, 0.0, 0.0, 0.0],
            [0.3, 0.3, 0.3, 0.3, 0.3, 0.3, 0.31],
        ];
        for grid in grids {
            let mut scores = EmotionScores::zeroed();
            for (category, value) in EmotionCategory::ALL.iter().zip(grid) {
                scores.set(*category, value);
            }
            let (dominant, confidence) = dominant_emotion(&scores);
            assert_eq!(confidence, scores.get(dominant));
            for (_, other) in scores.iter() {
                assert!(confidence >= other);
            }
        }
    }

    #[test]
    fn test_vendor_labels_are_mapped_and_unknown_dropped() {
        let result = normalize(Some(&raw(&[
            ("happiness", 0.2),
            ("surprise", 0.6),
            ("contempt", 0.95),
        ])));
        assert_eq!(result.dominant, EmotionCategory::Surprised);
        assert_relative_eq!(result.emotions.get(EmotionCategory::Happy), 0.2);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let result = normalize(Some(&raw(&[("angry", 3.0), ("sad", f32::NAN)])));
        assert_eq!(result.dominant, EmotionCategory::Angry);
        assert_relative_eq!(result.confidence, 1.0);
        assert_relative_eq!(result.emotions.get(EmotionCategory::Sad), 0.0);
    }

    #[test]
    fn test_age_and_gender_are_normalized() {
        let mut input = raw(&[("neutral", 0.9)]);
        input.age = Some(31.6);
        input.gender = Some("female".into());
        let result = normalize(Some(&input));
        assert_eq!(result.age, Some(32));
        assert_eq!(result.gender, Some(Gender::Female));

        input.age = Some(-4.0);
        input.gender = Some("?".into());
        let result = normalize(Some(&input));
        assert_eq!(result.age, None);
        assert_eq!(result.gender, None);
    }

    #[test]
    fn test_additional_data_follows_result() {
        let mut input = raw(&[("happy", 0.7)]);
        input.age = Some(40.0);
        let (state, extra) = to_emotion_state(&normalize(Some(&input)), Duration::ZERO);
        assert_eq!(state.tone, EmotionTone::Positive);
        assert!(extra.face_detected);
        assert_eq!(extra.age, Some(40));
    }

    #[test]
    fn test_tone_lookup_is_total() {
        for category in EmotionCategory::ALL {
            assert!(!tone_for(category).label().is_empty());
        }
        assert_eq!(tone_for(EmotionCategory::Neutral), EmotionTone::Balanced);
        assert_eq!(tone_for(EmotionCategory::Disgust), EmotionTone::Averse);
    }
}

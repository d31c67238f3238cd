use serde::Serialize;

/// The closed set of emotions this system reports.
///
/// Declaration order is the scan order used for dominant-emotion selection
/// and tie-breaking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgust,
}

impl EmotionCategory {
    pub const ALL: [EmotionCategory; 7] = [
        EmotionCategory::Neutral,
        EmotionCategory::Happy,
        EmotionCategory::Sad,
        EmotionCategory::Angry,
        EmotionCategory::Surprised,
        EmotionCategory::Fearful,
        EmotionCategory::Disgust,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionCategory::Neutral => "neutral",
            EmotionCategory::Happy => "happy",
            EmotionCategory::Sad => "sad",
            EmotionCategory::Angry => "angry",
            EmotionCategory::Surprised => "surprised",
            EmotionCategory::Fearful => "fearful",
            EmotionCategory::Disgust => "disgust",
        }
    }

    /// Maps a backend's label onto the closed set.
    ///
    /// Accepts this crate's own names plus the vocabularies of common face
    /// models (`disgusted`, `happiness`, `fear`, ...). Case-insensitive.
    /// Labels with no counterpart (e.g. `contempt`) yield `None`.
    pub fn from_label(label: &str) -> Option<EmotionCategory> {
        let category = match label.trim().to_ascii_lowercase().as_str() {
            "neutral" => EmotionCategory::Neutral,
            "happy" | "happiness" | "joy" => EmotionCategory::Happy,
            "sad" | "sadness" => EmotionCategory::Sad,
            "angry" | "anger" => EmotionCategory::Angry,
            "surprised" | "surprise" => EmotionCategory::Surprised,
            "fearful" | "fear" => EmotionCategory::Fearful,
            "disgust" | "disgusted" => EmotionCategory::Disgust,
            _ => return None,
        };
        Some(category)
    }
}

impl std::fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Probability-like score in `[0, 1]` for every category.
///
/// Values are not required to sum to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmotionScores {
    values: [f32; 7],
}

impl EmotionScores {
    /// All zeros.
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// `category` at 1, everything else at 0.
    pub fn certain(category: EmotionCategory) -> Self {
        let mut scores = Self::zeroed();
        scores.set(category, 1.0);
        scores
    }

    pub fn get(&self, category: EmotionCategory) -> f32 {
        self.values[category.index()]
    }

    /// Stores `value` clamped to `[0, 1]`; non-finite values become 0.
    pub fn set(&mut self, category: EmotionCategory, value: f32) {
        self.values[category.index()] = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn with(mut self, category: EmotionCategory, value: f32) -> Self {
        self.set(category, value);
        self
    }

    /// Pairs in [`EmotionCategory::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (EmotionCategory, f32)> + '_ {
        EmotionCategory::ALL.iter().map(|&c| (c, self.get(c)))
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(EmotionCategory::ALL.len()))?;
        for (category, value) in self.iter() {
            map.serialize_entry(category.as_str(), &value)?;
        }
        map.end()
    }
}

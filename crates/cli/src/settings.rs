use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use moodcam_core::emotion::infrastructure::onnx_emotion_analyzer::DEFAULT_MIN_FACE_CONFIDENCE;
use moodcam_core::shared::constants::{APP_DIR_NAME, DEFAULT_THROTTLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Persisted defaults for the CLI. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub throttle_ms: u64,
    pub min_face_confidence: f32,
    pub model_dir: Option<PathBuf>,
    pub input_format: Option<String>,
    pub device: Option<String>,
    pub output: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_THROTTLE.as_millis() as u64,
            min_face_confidence: DEFAULT_MIN_FACE_CONFIDENCE,
            model_dir: None,
            input_format: None,
            device: None,
            output: OutputFormat::Text,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or malformed files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.throttle_ms, 333);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "throttle_ms": 500, "output": "json" }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.throttle_ms, 500);
        assert_eq!(settings.output, OutputFormat::Json);
        assert_eq!(settings.min_face_confidence, DEFAULT_MIN_FACE_CONFIDENCE);
    }
}

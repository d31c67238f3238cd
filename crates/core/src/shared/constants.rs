use std::time::Duration;

/// Minimum wall-clock gap between two detection attempts (~3 Hz).
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(333);

/// One display refresh at 60 Hz; the cadence of scheduler ticks.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_micros(16_667);

pub const FACE_MODEL_NAME: &str = "version-RFB-320.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

pub const EMOTION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const EMOTION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// Output order of the FER+ classifier.
pub const FERPLUS_LABELS: [&str; 8] = [
    "neutral",
    "happiness",
    "surprise",
    "sadness",
    "anger",
    "disgust",
    "fear",
    "contempt",
];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Name of the application directory under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "Moodcam";

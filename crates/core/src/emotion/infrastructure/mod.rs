pub mod emotion_detector;
pub mod onnx_emotion_analyzer;
pub mod onnx_session;

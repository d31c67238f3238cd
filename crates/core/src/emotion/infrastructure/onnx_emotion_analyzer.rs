//! Face location with UltraFace (RFB-320) followed by FER+ expression
//! classification, both through ONNX Runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ort::session::Session;

use crate::emotion::domain::emotion_analyzer::{AnalyzerLoader, EmotionAnalyzer, RawFaceAnalysis};
use crate::emotion::infrastructure::onnx_session::build_session;
use crate::shared::constants::{
    EMOTION_MODEL_NAME, EMOTION_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL, FERPLUS_LABELS,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, ModelSpec};

/// UltraFace input resolution (width, height).
const FACE_INPUT: (usize, usize) = (320, 240);

/// FER+ input side length.
const EMOTION_INPUT: usize = 64;

pub const DEFAULT_MIN_FACE_CONFIDENCE: f32 = 0.7;

const NMS_IOU_THRESH: f32 = 0.3;

/// Fraction of the box size added on every side before cropping.
const CROP_MARGIN: f32 = 0.1;

pub const FACE_MODEL: ModelSpec = ModelSpec {
    name: FACE_MODEL_NAME,
    url: FACE_MODEL_URL,
};

pub const EMOTION_MODEL: ModelSpec = ModelSpec {
    name: EMOTION_MODEL_NAME,
    url: EMOTION_MODEL_URL,
};

/// Candidate face in normalized `[0, 1]` image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FaceBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Pixel rectangle `(x, y, w, h)` with `margin` added on each side,
    /// clamped to the frame.
    fn to_pixels(&self, width: u32, height: u32, margin: f32) -> (u32, u32, u32, u32) {
        let (fw, fh) = (width as f32, height as f32);
        let mx = (self.x2 - self.x1) * margin;
        let my = (self.y2 - self.y1) * margin;
        let x1 = ((self.x1 - mx) * fw).clamp(0.0, fw);
        let y1 = ((self.y1 - my) * fh).clamp(0.0, fh);
        let x2 = ((self.x2 + mx) * fw).clamp(0.0, fw);
        let y2 = ((self.y2 + my) * fh).clamp(0.0, fh);
        (
            x1 as u32,
            y1 as u32,
            (x2 - x1).round() as u32,
            (y2 - y1).round() as u32,
        )
    }
}

pub struct OnnxEmotionAnalyzer {
    face_session: Session,
    emotion_session: Session,
    min_face_confidence: f32,
}

impl OnnxEmotionAnalyzer {
    pub fn new(
        face_model: &Path,
        emotion_model: &Path,
        min_face_confidence: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            face_session: build_session(face_model)?,
            emotion_session: build_session(emotion_model)?,
            min_face_confidence,
        })
    }

    fn locate_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(preprocess_face_input(frame))?;
        let outputs = self.face_session.run(ort::inputs![input])?;

        // scores: [1, N, 2] (background, face); boxes: [1, N, 4] corners
        if outputs.len() < 2 {
            return Err(format!("UltraFace expected 2 outputs, got {}", outputs.len()).into());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        let boxes = outputs[1].try_extract_array::<f32>()?;
        let scores = scores.as_slice().ok_or("Cannot get score slice")?;
        let boxes = boxes.as_slice().ok_or("Cannot get box slice")?;

        let mut candidates = decode_faces(scores, boxes, self.min_face_confidence);
        Ok(nms(&mut candidates, NMS_IOU_THRESH))
    }

    fn classify(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(preprocess_emotion_input(face))?;
        let outputs = self.emotion_session.run(ort::inputs![input])?;
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits = logits.as_slice().ok_or("Cannot get logit slice")?;
        if logits.len() != FERPLUS_LABELS.len() {
            return Err(format!(
                "FER+ expected {} outputs, got {}",
                FERPLUS_LABELS.len(),
                logits.len()
            )
            .into());
        }
        Ok(softmax(logits))
    }
}

impl EmotionAnalyzer for OnnxEmotionAnalyzer {
    fn analyze(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<RawFaceAnalysis>, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("expected RGB frame, got {} channels", frame.channels()).into());
        }

        let faces = self.locate_faces(frame)?;
        let Some(face) = largest_face(&faces) else {
            return Ok(None);
        };

        let (x, y, w, h) = face.to_pixels(frame.width(), frame.height(), CROP_MARGIN);
        let Some(crop) = frame.crop(x, y, w, h) else {
            return Ok(None);
        };

        let probabilities = self.classify(&crop)?;
        Ok(Some(RawFaceAnalysis::from_scores(
            FERPLUS_LABELS.iter().copied().zip(probabilities),
        )))
    }
}

type DownloadProgress = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Resolves both model files (cache, bundled dir, then download) and builds
/// an [`OnnxEmotionAnalyzer`].
pub struct OnnxAnalyzerLoader {
    bundled_dir: Option<PathBuf>,
    min_face_confidence: f32,
    progress: Option<DownloadProgress>,
}

impl OnnxAnalyzerLoader {
    pub fn new(bundled_dir: Option<PathBuf>, min_face_confidence: f32) -> Self {
        Self {
            bundled_dir,
            min_face_confidence,
            progress: None,
        }
    }

    /// Reports `(model_name, bytes_downloaded, total_bytes)` while fetching.
    pub fn with_progress(
        mut self,
        progress: impl Fn(&str, u64, u64) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    fn resolve(&self, spec: &ModelSpec) -> Result<PathBuf, model_resolver::ModelResolveError> {
        let progress = self.progress.clone().map(|report| {
            let name = spec.name;
            Box::new(move |done: u64, total: u64| report(name, done, total))
                as model_resolver::ProgressFn
        });
        model_resolver::resolve(spec, self.bundled_dir.as_deref(), progress)
    }
}

impl Default for OnnxAnalyzerLoader {
    fn default() -> Self {
        Self::new(None, DEFAULT_MIN_FACE_CONFIDENCE)
    }
}

impl AnalyzerLoader for OnnxAnalyzerLoader {
    fn load(&self) -> Result<Box<dyn EmotionAnalyzer>, Box<dyn std::error::Error + Send + Sync>> {
        let face_model = self.resolve(&FACE_MODEL)?;
        let emotion_model = self.resolve(&EMOTION_MODEL)?;
        let analyzer =
            OnnxEmotionAnalyzer::new(&face_model, &emotion_model, self.min_face_confidence)
                .map_err(|e| format!("failed to build ONNX sessions: {e}"))?;
        Ok(Box::new(analyzer))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize to 320x240 and normalize to `(p - 127) / 128`, NCHW float32.
fn preprocess_face_input(frame: &Frame) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let (w, h) = FACE_INPUT;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, h, w));

    for y in 0..h {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / h as f64) as usize).min(src_h - 1);
        for x in 0..w {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / w as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - 127.0) / 128.0;
            }
        }
    }

    tensor
}

/// Resize to 64x64 grayscale in raw `[0, 255]` range, NCHW float32.
fn preprocess_emotion_input(face: &Frame) -> ndarray::Array4<f32> {
    let src = face.as_ndarray();
    let src_h = face.height() as usize;
    let src_w = face.width() as usize;
    let s = EMOTION_INPUT;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 1, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            let r = src[[src_y, src_x, 0]] as f32;
            let g = src[[src_y, src_x, 1]] as f32;
            let b = src[[src_y, src_x, 2]] as f32;
            tensor[[0, 0, y, x]] = 0.299 * r + 0.587 * g + 0.114 * b;
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

fn decode_faces(scores: &[f32], boxes: &[f32], min_confidence: f32) -> Vec<FaceBox> {
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(s, _)| s[1] >= min_confidence)
        .map(|(s, b)| FaceBox {
            x1: b[0].clamp(0.0, 1.0),
            y1: b[1].clamp(0.0, 1.0),
            x2: b[2].clamp(0.0, 1.0),
            y2: b[3].clamp(0.0, 1.0),
            score: s[1],
        })
        .filter(|f| f.area() > 0.0)
        .collect()
}

fn nms(dets: &mut [FaceBox], iou_thresh: f32) -> Vec<FaceBox> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| iou(k, det) <= iou_thresh) {
            keep.push(*det);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.area() + b.area() - inter)
}

/// The closest face is taken to be the subject.
fn largest_face(faces: &[FaceBox]) -> Option<FaceBox> {
    faces
        .iter()
        .copied()
        .max_by(|a, b| a.area().partial_cmp(&b.area()).unwrap_or(std::cmp::Ordering::Equal))
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    #[test]
    fn test_face_input_shape_and_range() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let tensor = preprocess_face_input(&frame);
        assert_eq!(tensor.shape(), &[1, 3, 240, 320]);
        assert_relative_eq!(tensor[[0, 2, 239, 319]], 1.0);
    }

    #[test]
    fn test_emotion_input_is_grayscale_pixels() {
        let mut data = Vec::new();
        for _ in 0..(10 * 10) {
            data.extend_from_slice(&[100, 100, 100]);
        }
        let frame = Frame::new(data, 10, 10, 3, 0);
        let tensor = preprocess_emotion_input(&frame);
        assert_eq!(tensor.shape(), &[1, 1, 64, 64]);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_decode_filters_by_face_score() {
        let scores = [0.9, 0.1, 0.2, 0.8];
        let boxes = [0.0, 0.0, 0.5, 0.5, 0.1, 0.1, 0.6, 0.7];
        let faces = decode_faces(&scores, &boxes, 0.7);
        assert_eq!(faces.len(), 1);
        assert_relative_eq!(faces[0].score, 0.8);
        assert_relative_eq!(faces[0].y2, 0.7);
    }

    #[test]
    fn test_decode_drops_degenerate_boxes() {
        let faces = decode_faces(&[0.0, 0.99], &[0.5, 0.5, 0.4, 0.9], 0.5);
        assert!(faces.is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut dets = vec![
            face(0.0, 0.0, 0.5, 0.5, 0.7),
            face(0.02, 0.02, 0.52, 0.52, 0.9),
            face(0.6, 0.6, 0.9, 0.9, 0.8),
        ];
        let kept = nms(&mut dets, NMS_IOU_THRESH);
        assert_eq!(kept.len(), 2);
        assert_relative_eq!(kept[0].score, 0.9);
        assert_relative_eq!(kept[1].score, 0.8);
    }

    #[test]
    fn test_largest_face_wins_over_most_confident() {
        let faces = [face(0.0, 0.0, 0.1, 0.1, 0.99), face(0.3, 0.3, 0.8, 0.8, 0.75)];
        let chosen = largest_face(&faces).unwrap();
        assert_relative_eq!(chosen.score, 0.75);
        assert!(largest_face(&[]).is_none());
    }

    #[test]
    fn test_to_pixels_adds_margin_and_clamps() {
        let (x, y, w, h) = face(0.0, 0.25, 0.5, 0.75, 1.0).to_pixels(200, 100, 0.1);
        assert_eq!((x, y), (0, 20));
        assert_eq!(w, 110);
        assert_eq!(h, 60);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_is_shift_invariant() {
        let a = softmax(&[1000.0, 1001.0]);
        let b = softmax(&[0.0, 1.0]);
        assert_relative_eq!(a[1], b[1], epsilon = 1e-5);
    }

    #[test]
    #[ignore] // Requires network access and ONNX Runtime
    fn test_loader_builds_analyzer_for_blank_frame() {
        let loader = OnnxAnalyzerLoader::default();
        let mut analyzer = loader.load().unwrap();
        let frame = Frame::new(vec![0u8; 320 * 240 * 3], 320, 240, 3, 0);
        assert!(analyzer.analyze(&frame).unwrap().is_none());
    }
}

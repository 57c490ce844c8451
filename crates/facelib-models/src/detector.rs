//! Face detector via ONNX Runtime.
//!
//! Expects an UltraFace-style model: one RGB NCHW input and two outputs,
//! per-anchor class scores `[1, N, 2]` (background, face) and box corners
//! `[1, N, 4]` as `x1, y1, x2, y2` normalized to the input frame.

use facelib_core::{BoundingBox, RawImage};
use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::image_io;

const DETECTOR_INPUT_WIDTH: u32 = 320;
const DETECTOR_INPUT_HEIGHT: u32 = 240;
const DETECTOR_MEAN: f32 = 127.0;
const DETECTOR_STD: f32 = 128.0;
const DETECTOR_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error(transparent)]
    Image(#[from] image_io::ImageError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face detector holding an ONNX Runtime session. The session is released on drop.
pub struct FaceDetector {
    session: Session,
    confidence_threshold: f32,
    scores_idx: usize,
    boxes_idx: usize,
}

impl FaceDetector {
    /// Load the detection model. Faces scoring below `confidence_threshold` are dropped.
    pub fn load(model_path: &Path, confidence_threshold: f32) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "detector needs score and box outputs, model has {}",
                output_names.len()
            )));
        }
        let (scores_idx, boxes_idx) = output_indices(&output_names);

        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            scores_idx,
            boxes_idx,
            "loaded face detector"
        );

        Ok(Self {
            session,
            confidence_threshold,
            scores_idx,
            boxes_idx,
        })
    }

    /// Detect faces, returning boxes in `image` pixel coordinates, most confident first.
    pub fn detect(&mut self, image: &RawImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let input = preprocess(image)?;
        let (scores_idx, boxes_idx) = (self.scores_idx, self.boxes_idx);
        let threshold = self.confidence_threshold;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        if scores.len() / 2 != boxes.len() / 4 {
            return Err(DetectorError::InferenceFailed(format!(
                "{} score pairs but {} boxes",
                scores.len() / 2,
                boxes.len() / 4
            )));
        }

        let candidates = decode(scores, boxes, image.width as f32, image.height as f32, threshold);
        let faces = suppress(candidates, DETECTOR_NMS_THRESHOLD);
        tracing::debug!(faces = faces.len(), "detection finished");
        Ok(faces)
    }
}

/// Locate the score and box outputs by name, falling back to `(0, 1)`.
fn output_indices(names: &[String]) -> (usize, usize) {
    let find = |needle: &str| names.iter().position(|n| n.to_ascii_lowercase().contains(needle));
    match (find("score"), find("box")) {
        (Some(s), Some(b)) if s != b => (s, b),
        _ => (0, 1),
    }
}

/// Stretch to the model input size and normalize into an NCHW tensor.
fn preprocess(image: &RawImage) -> Result<Array4<f32>, DetectorError> {
    let rgb = image_io::to_rgb_image(image)?;
    let resized = image::imageops::resize(
        &rgb,
        DETECTOR_INPUT_WIDTH,
        DETECTOR_INPUT_HEIGHT,
        FilterType::Triangle,
    );

    let (w, h) = (DETECTOR_INPUT_WIDTH as usize, DETECTOR_INPUT_HEIGHT as usize);
    let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - DETECTOR_MEAN) / DETECTOR_STD;
        }
    }
    Ok(tensor)
}

/// Turn raw anchor outputs into boxes above `threshold`, in `width` × `height` pixels.
fn decode(scores: &[f32], boxes: &[f32], width: f32, height: f32, threshold: f32) -> Vec<BoundingBox> {
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] >= threshold)
        .map(|(score, corners)| {
            let x1 = corners[0].clamp(0.0, 1.0) * width;
            let y1 = corners[1].clamp(0.0, 1.0) * height;
            let x2 = corners[2].clamp(0.0, 1.0) * width;
            let y2 = corners[3].clamp(0.0, 1.0) * height;
            BoundingBox {
                x: x1,
                y: y1,
                width: (x2 - x1).max(0.0),
                height: (y2 - y1).max(0.0),
                confidence: score[1],
            }
        })
        .filter(|b| b.width > 0.0 && b.height > 0.0)
        .collect()
}

/// Greedy non-maximum suppression; output is sorted by descending confidence.
fn suppress(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| overlap(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection over union.
fn overlap(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let iy = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = ix * iy;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}

//! facelib-models: concrete collaborators for `facelib-core`.
//!
//! Image decoding through the `image` crate, and face detection plus
//! descriptor extraction through ONNX Runtime. All native model handles live
//! here and are released when the owning value is dropped.

pub mod detector;
pub mod encoder;
pub mod image_io;

use std::path::{Path, PathBuf};

use facelib_core::{BackendError, BoundingBox, Encoding, FaceEmbedder, RawImage};

pub use detector::{DetectorError, FaceDetector};
pub use encoder::{DescriptorExtractor, EncoderError};
pub use image_io::{ImageError, ImageRsCodec};

/// Model file names and policy values for [`OnnxEmbedder::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub detector_model: String,
    pub encoder_model: String,
    /// Minimum detector score for a face.
    pub detection_confidence: f32,
    /// Side of the square face chip fed to the descriptor model.
    pub chip_size: u32,
    /// Fraction of the face box added around it before cropping the chip.
    pub chip_margin: f32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            detector_model: "face_detector.onnx".to_string(),
            encoder_model: "face_descriptor.onnx".to_string(),
            detection_confidence: 0.7,
            chip_size: 150,
            chip_margin: 0.25,
        }
    }
}

/// Per-user data directory: `$XDG_DATA_HOME/facelib`, falling back to `~/.local/share/facelib`.
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facelib")
}

/// Default model directory: `<data_dir>/models`.
pub fn default_model_dir() -> PathBuf {
    data_dir().join("models")
}

/// Detector and descriptor model pair implementing [`FaceEmbedder`].
pub struct OnnxEmbedder {
    detector: FaceDetector,
    extractor: DescriptorExtractor,
}

impl OnnxEmbedder {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path, options: &ModelOptions) -> Result<Self, BackendError> {
        let detector = FaceDetector::load(
            &model_dir.join(&options.detector_model),
            options.detection_confidence,
        )
        .map_err(|e| BackendError::Detection(Box::new(e)))?;
        let extractor = DescriptorExtractor::load(
            &model_dir.join(&options.encoder_model),
            options.chip_size,
            options.chip_margin,
        )
        .map_err(|e| BackendError::Extraction(Box::new(e)))?;
        Ok(Self {
            detector,
            extractor,
        })
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn detect_faces(&mut self, image: &RawImage) -> Result<Vec<BoundingBox>, BackendError> {
        self.detector
            .detect(image)
            .map_err(|e| BackendError::Detection(Box::new(e)))
    }

    fn encode_face(&mut self, image: &RawImage, face: &BoundingBox) -> Result<Encoding, BackendError> {
        self.extractor
            .extract(image, face)
            .map_err(|e| BackendError::Extraction(Box::new(e)))
    }
}

//! Face descriptor extraction via ONNX Runtime.
//!
//! Cuts a square chip around the detected face (box plus margin), scales it
//! to the model's input size and runs the embedding network. The output
//! tensor's shape, minus the batch axis, becomes the encoding's rows × columns.

use facelib_core::{BoundingBox, Encoding, RawImage, ShapeMismatch};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::image_io;

const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box lies outside the image")]
    EmptyChip,
    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
    #[error(transparent)]
    Image(#[from] image_io::ImageError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Descriptor extractor holding an ONNX Runtime session. The session is released on drop.
pub struct DescriptorExtractor {
    session: Session,
    chip_size: u32,
    chip_margin: f32,
}

impl DescriptorExtractor {
    /// Load the embedding model.
    ///
    /// `chip_size` is the model's square input side in pixels; `chip_margin`
    /// widens the face box by that fraction of its size on every side.
    pub fn load(model_path: &Path, chip_size: u32, chip_margin: f32) -> Result<Self, EncoderError> {
        if !model_path.exists() {
            return Err(EncoderError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            chip_size,
            chip_margin,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded descriptor model"
        );

        Ok(Self {
            session,
            chip_size,
            chip_margin,
        })
    }

    /// Anonymous encoding for the face at `face` in `image`.
    pub fn extract(&mut self, image: &RawImage, face: &BoundingBox) -> Result<Encoding, EncoderError> {
        let chip = face_chip(image, face, self.chip_size, self.chip_margin)?;
        let input = preprocess(&chip);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("descriptor extraction: {e}")))?;

        let dims: Vec<usize> = shape.iter().skip(1).map(|&d| d.max(0) as usize).collect();
        let (rows, columns) = matrix_shape(&dims, data.len());
        Ok(Encoding::from_matrix(data.to_vec(), rows, columns, None)?)
    }
}

/// Map an output tensor shape (batch axis removed) to a descriptor matrix shape.
///
/// A flat output becomes a single row; a 2-d output keeps its shape; anything
/// else is flattened.
fn matrix_shape(dims: &[usize], len: usize) -> (usize, usize) {
    match dims {
        [d] => (1, *d),
        [r, c] => (*r, *c),
        _ => (1, len),
    }
}

/// Square crop centred on the face, enlarged by `margin`, scaled to `size` × `size`.
fn face_chip(image: &RawImage, face: &BoundingBox, size: u32, margin: f32) -> Result<RgbImage, EncoderError> {
    let side = face.width.max(face.height) * (1.0 + 2.0 * margin);
    let centre_x = face.x + face.width / 2.0;
    let centre_y = face.y + face.height / 2.0;
    let region = BoundingBox {
        x: centre_x - side / 2.0,
        y: centre_y - side / 2.0,
        width: side,
        height: side,
        confidence: face.confidence,
    };

    let crop = image.crop(&region).ok_or(EncoderError::EmptyChip)?;
    let rgb = image_io::to_rgb_image(&crop)?;
    Ok(image::imageops::resize(&rgb, size, size, FilterType::Lanczos3))
}

/// Normalize an RGB chip into a NCHW float tensor.
fn preprocess(chip: &RgbImage) -> Array4<f32> {
    let (w, h) = chip.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, pixel) in chip.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - ENCODER_MEAN) / ENCODER_STD;
        }
    }
    tensor
}

//! Image decoding and resizing via the `image` crate.

use std::path::Path;

use facelib_core::{BackendError, ImageCodec, RawImage};
use image::imageops::FilterType;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("pixel buffer does not match {width}x{height} RGB8")]
    BadBuffer { width: u32, height: u32 },
}

/// [`ImageCodec`] backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageRsCodec {
    filter: FilterType,
}

impl Default for ImageRsCodec {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }
}

impl ImageCodec for ImageRsCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RawImage, BackendError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| BackendError::Decode(Box::new(ImageError::from(e))))?;
        Ok(from_rgb_image(decoded.to_rgb8()))
    }

    fn resize(&self, image: &RawImage, max_width: u32, max_height: u32) -> RawImage {
        let (width, height) = fit_dimensions(image.width, image.height, max_width, max_height);
        if (width, height) == (image.width, image.height) {
            return image.clone();
        }
        match to_rgb_image(image) {
            Ok(buffer) => from_rgb_image(image::imageops::resize(&buffer, width, height, self.filter)),
            Err(e) => {
                tracing::warn!(error = %e, "cannot resize malformed image; returning it unchanged");
                image.clone()
            }
        }
    }
}

/// Target size when scaling `width` × `height` into `max_width` × `max_height`.
///
/// Landscape images take the full width and portrait or square images the
/// full height; the other side follows the aspect ratio, truncated, and never
/// drops below one pixel.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let (w, h) = if width > height {
        let h = (height as u64 * max_width as u64 / width as u64) as u32;
        (max_width, h)
    } else {
        let w = (width as u64 * max_height as u64 / height as u64) as u32;
        (w, max_height)
    };
    (w.max(1), h.max(1))
}

pub fn to_rgb_image(image: &RawImage) -> Result<RgbImage, ImageError> {
    RgbImage::from_raw(image.width, image.height, image.pixels.clone()).ok_or(ImageError::BadBuffer {
        width: image.width,
        height: image.height,
    })
}

pub fn from_rgb_image(buffer: RgbImage) -> RawImage {
    let (width, height) = buffer.dimensions();
    RawImage {
        width,
        height,
        pixels: buffer.into_raw(),
    }
}

/// Write `image` to `path`; the format follows the file extension.
pub fn write_image(image: &RawImage, path: &Path) -> Result<(), ImageError> {
    to_rgb_image(image)?.save(path)?;
    Ok(())
}

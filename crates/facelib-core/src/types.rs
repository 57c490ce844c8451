use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in pixel coordinates of the image it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Multiply horizontal position and size by `sx`, vertical by `sy`, keeping the confidence.
    pub fn scaled_xy(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            confidence: self.confidence,
        }
    }

    /// Integer pixel region `(x, y, width, height)` clamped to a `max_width` × `max_height` image.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn clamped_region(&self, max_width: u32, max_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.floor().max(0.0) as u32;
        let y0 = self.y.floor().max(0.0) as u32;
        let x1 = ((self.x + self.width).ceil().max(0.0) as u32).min(max_width);
        let y1 = ((self.y + self.height).ceil().max(0.0) as u32).min(max_height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// A decoded image: packed RGB8, row-major, no padding between rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

impl RawImage {
    pub const CHANNELS: usize = 3;

    /// Wrap packed RGB8 pixels. Returns `None` if the buffer length does not match.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Copy out the rectangle covered by `face`, clamped to the image bounds.
    ///
    /// Returns `None` when nothing of the box lies inside the image, or when
    /// `pixels` is shorter than `width * height * 3`.
    pub fn crop(&self, face: &BoundingBox) -> Option<RawImage> {
        let (x, y, w, h) = face.clamped_region(self.width, self.height)?;
        let stride = self.width as usize * Self::CHANNELS;
        let row_len = w as usize * Self::CHANNELS;
        let mut pixels = Vec::with_capacity(row_len * h as usize);
        for row in y as usize..(y + h) as usize {
            let start = row * stride + x as usize * Self::CHANNELS;
            pixels.extend_from_slice(self.pixels.get(start..start + row_len)?);
        }
        Some(RawImage {
            width: w,
            height: h,
            pixels,
        })
    }
}

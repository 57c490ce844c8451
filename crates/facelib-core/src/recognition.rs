//! Recognition facade: images in, identities out.
//!
//! Image decoding and the face model are external collaborators behind
//! [`ImageCodec`] and [`FaceEmbedder`]. This module owns the gallery and the
//! matcher and wires them to those collaborators.

use std::path::{Path, PathBuf};

use crate::codec::{Codec, SkippedLine};
use crate::encoding::{is_valid_id, Encoding};
use crate::error::{BackendError, FaceError, ShapeMismatch};
use crate::gallery::{Enrolled, Gallery};
use crate::matcher::{EuclideanMatcher, MatchResult, Matcher, DEFAULT_MATCH_THRESHOLD};
use crate::types::{BoundingBox, RawImage};

/// Image decoding and resizing.
pub trait ImageCodec {
    /// Decode an encoded image (PNG, JPEG, ...) into RGB8 pixels.
    fn decode(&self, bytes: &[u8]) -> Result<RawImage, BackendError>;

    /// Scale `image` to fit within `max_width` × `max_height`, keeping its aspect ratio.
    fn resize(&self, image: &RawImage, max_width: u32, max_height: u32) -> RawImage;
}

/// Face detection and descriptor extraction.
pub trait FaceEmbedder {
    /// Faces in `image`, most confident first.
    fn detect_faces(&mut self, image: &RawImage) -> Result<Vec<BoundingBox>, BackendError>;

    /// Anonymous descriptor for the face at `face`.
    fn encode_face(&mut self, image: &RawImage, face: &BoundingBox) -> Result<Encoding, BackendError>;
}

/// Tunables for [`FaceRecognition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionOptions {
    /// Acceptance threshold on Euclidean distance.
    pub match_threshold: f64,
    /// Images whose larger side exceeds this are shrunk before detection.
    pub max_image_dimension: u32,
    /// Bounding square for [`FaceRecognition::face_preview`].
    pub preview_size: u32,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            max_image_dimension: 1024,
            preview_size: 256,
        }
    }
}

/// Summary of [`FaceRecognition::enroll_directory`].
#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub enrolled: usize,
    /// Images in which no face was found.
    pub no_face: Vec<PathBuf>,
    /// Images that could not be read or processed.
    pub failed: Vec<(PathBuf, FaceError)>,
}

/// An image prepared for detection.
struct Prepared {
    original: RawImage,
    working: RawImage,
    /// Multiply working-image coordinates by these to get original coordinates.
    scale_x: f32,
    scale_y: f32,
}

impl Prepared {
    fn to_original(&self, face: &BoundingBox) -> BoundingBox {
        face.scaled_xy(self.scale_x, self.scale_y)
    }
}

/// Identifies faces against an in-memory gallery.
pub struct FaceRecognition<I, E> {
    images: I,
    embedder: E,
    gallery: Gallery,
    matcher: EuclideanMatcher,
    codec: Codec,
    options: RecognitionOptions,
}

impl<I: ImageCodec, E: FaceEmbedder> FaceRecognition<I, E> {
    pub fn new(images: I, embedder: E, options: RecognitionOptions) -> Self {
        Self {
            images,
            embedder,
            gallery: Gallery::new(),
            matcher: EuclideanMatcher::new(options.match_threshold),
            codec: Codec::default(),
            options,
        }
    }

    /// Use `codec` for [`save`](Self::save) and [`load`](Self::load).
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn options(&self) -> &RecognitionOptions {
        &self.options
    }

    /// Faces in the image, in original image coordinates.
    pub fn face_locations(&mut self, bytes: &[u8]) -> Result<Vec<BoundingBox>, FaceError> {
        let prepared = self.prepare(bytes)?;
        let faces = self.embedder.detect_faces(&prepared.working)?;
        Ok(faces.iter().map(|f| prepared.to_original(f)).collect())
    }

    /// The most confident face in the image.
    pub fn face_location(&mut self, bytes: &[u8]) -> Result<Option<BoundingBox>, FaceError> {
        Ok(self.face_locations(bytes)?.into_iter().next())
    }

    /// Anonymous encodings for every face in the image.
    pub fn face_encodings(&mut self, bytes: &[u8]) -> Result<Vec<Encoding>, FaceError> {
        let prepared = self.prepare(bytes)?;
        let faces = self.embedder.detect_faces(&prepared.working)?;
        faces
            .iter()
            .map(|face| {
                self.embedder
                    .encode_face(&prepared.working, face)
                    .map_err(FaceError::from)
            })
            .collect()
    }

    /// Anonymous encoding of the most confident face, if there is one.
    pub fn face_encoding(&mut self, bytes: &[u8]) -> Result<Option<Encoding>, FaceError> {
        let prepared = self.prepare(bytes)?;
        let faces = self.embedder.detect_faces(&prepared.working)?;
        match faces.first() {
            Some(face) => Ok(Some(self.embedder.encode_face(&prepared.working, face)?)),
            None => Ok(None),
        }
    }

    /// Enroll the most confident face in the image under `id`.
    ///
    /// Returns `Ok(false)` when the image holds no face; the gallery is then unchanged.
    pub fn enroll(&mut self, bytes: &[u8], id: &str) -> Result<bool, FaceError> {
        if !is_valid_id(id) {
            return Err(FaceError::InvalidId(id.to_string()));
        }
        let Some(encoding) = self.face_encoding(bytes)? else {
            tracing::info!(id, "no face found; nothing enrolled");
            return Ok(false);
        };
        self.enroll_encoding(encoding.with_id(id))?;
        Ok(true)
    }

    /// Enroll an already computed encoding. Its id must be a valid identity.
    pub fn enroll_encoding(&mut self, encoding: Encoding) -> Result<Enrolled, FaceError> {
        if !is_valid_id(encoding.id()) {
            return Err(FaceError::InvalidId(encoding.id().to_string()));
        }
        let id = encoding.id().to_string();
        let outcome = self.gallery.enroll(encoding);
        tracing::info!(id, replaced = matches!(outcome, Enrolled::Replaced(_)), "face enrolled");
        Ok(outcome)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.gallery.remove(id)
    }

    /// Identity of the most confident face in the image, if it matches an enrolled one.
    pub fn identify(&mut self, bytes: &[u8]) -> Result<Option<String>, FaceError> {
        match self.face_encoding(bytes)? {
            Some(probe) => self.identify_encoding(&probe),
            None => Ok(None),
        }
    }

    /// Identity closest to `probe` within the threshold.
    ///
    /// "No match" is `Ok(None)`. Fails with [`ShapeMismatch`] only when the
    /// gallery is non-empty and no enrolled encoding shares the probe's shape.
    pub fn identify_encoding(&self, probe: &Encoding) -> Result<Option<String>, FaceError> {
        let result = self.compare(probe);
        if result.compared == 0 && result.mismatched > 0 {
            let right = self.gallery.dimensions().unwrap_or_default();
            return Err(ShapeMismatch::Dimensions {
                left: probe.dimensions(),
                right,
            }
            .into());
        }
        Ok(result.id)
    }

    /// Full match details for `probe`.
    pub fn compare(&self, probe: &Encoding) -> MatchResult {
        self.matcher.compare(probe, &self.gallery)
    }

    /// Replace the gallery with one encoding per image file in `dir`.
    ///
    /// Each file's stem is its identity. Files are visited in name order.
    /// Unreadable images and images without a face are reported, not fatal.
    pub fn enroll_directory(&mut self, dir: &Path) -> Result<DirectoryReport, FaceError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        self.gallery.clear();
        let mut report = DirectoryReport::default();
        for path in paths {
            let id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => {
                    report.failed.push((path.clone(), FaceError::InvalidId(path.display().to_string())));
                    continue;
                }
            };
            let outcome = std::fs::read(&path)
                .map_err(FaceError::from)
                .and_then(|bytes| self.enroll(&bytes, &id));
            match outcome {
                Ok(true) => report.enrolled += 1,
                Ok(false) => {
                    tracing::warn!(path = %path.display(), "no face found");
                    report.no_face.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping image");
                    report.failed.push((path, e));
                }
            }
        }
        tracing::info!(
            dir = %dir.display(),
            enrolled = report.enrolled,
            no_face = report.no_face.len(),
            failed = report.failed.len(),
            "directory enrolled"
        );
        Ok(report)
    }

    /// The most confident face cropped from the original image and scaled to
    /// fit the preview square.
    pub fn face_preview(&mut self, bytes: &[u8]) -> Result<Option<RawImage>, FaceError> {
        let prepared = self.prepare(bytes)?;
        let faces = self.embedder.detect_faces(&prepared.working)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };
        let face = prepared.to_original(face);
        let size = self.options.preview_size;
        Ok(prepared
            .original
            .crop(&face)
            .map(|crop| self.images.resize(&crop, size, size)))
    }

    pub fn save(&self, path: &Path) -> Result<(), FaceError> {
        Ok(self.codec.save(&self.gallery, path)?)
    }

    /// Replace the gallery with the one stored at `path`, returning the skipped records.
    ///
    /// On I/O failure the current gallery is kept.
    pub fn load(&mut self, path: &Path) -> Result<Vec<SkippedLine>, FaceError> {
        let report = self.codec.load(path)?;
        self.gallery = report.gallery;
        Ok(report.skipped)
    }

    fn prepare(&self, bytes: &[u8]) -> Result<Prepared, FaceError> {
        let original = self.images.decode(bytes)?;
        let limit = self.options.max_image_dimension;
        if limit == 0 || original.width.max(original.height) <= limit {
            return Ok(Prepared {
                working: original.clone(),
                original,
                scale_x: 1.0,
                scale_y: 1.0,
            });
        }
        let working = self.images.resize(&original, limit, limit);
        // the resize truncates the free side, so each axis keeps its own factor
        let scale_x = original.width as f32 / working.width.max(1) as f32;
        let scale_y = original.height as f32 / working.height.max(1) as f32;
        tracing::debug!(
            from = ?(original.width, original.height),
            to = ?(working.width, working.height),
            "downscaled image for detection"
        );
        Ok(Prepared {
            original,
            working,
            scale_x,
            scale_y,
        })
    }
}

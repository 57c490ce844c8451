//! facelib-core: face descriptor gallery and nearest-match engine.
//!
//! Stores one descriptor per identity, persists galleries in a line-oriented
//! text format and identifies probes by Euclidean nearest neighbour.
//! Face detection and descriptor extraction are supplied by the caller
//! through [`FaceEmbedder`].

pub mod cipher;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod gallery;
pub mod matcher;
pub mod recognition;
pub mod types;

pub use cipher::{AesGcmCipher, PlainBase64, VectorCipher};
pub use codec::{Codec, LoadReport, SkippedLine};
pub use encoding::Encoding;
pub use error::{BackendError, DecodeError, FaceError, GalleryError, ShapeMismatch};
pub use gallery::{Enrolled, Gallery, SharedGallery};
pub use matcher::{EuclideanMatcher, MatchResult, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use recognition::{DirectoryReport, FaceEmbedder, FaceRecognition, ImageCodec, RecognitionOptions};
pub use types::{BoundingBox, RawImage};

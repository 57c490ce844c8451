//! Error types for encodings, gallery persistence and the recognition facade.

use thiserror::Error;

/// Boxed error from an external collaborator (image decoder, model runtime).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Vector length or dimensionality disagreement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    /// Raised at construction: the value count does not fill the declared matrix.
    #[error("vector has {len} values but declared shape is {rows}x{columns}")]
    Length {
        len: usize,
        rows: usize,
        columns: usize,
    },
    /// Raised when comparing encodings of different matrix shapes.
    #[error("cannot compare {left:?} encoding against {right:?} (rows, columns)")]
    Dimensions {
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// Failure to reconstruct a single persisted gallery record.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("expected 4 `|`-separated fields, found {found}")]
    MissingFields { found: usize },
    #[error("record has an empty identity")]
    EmptyId,
    #[error("invalid {field} {value:?}: expected a positive integer")]
    Integer { field: &'static str, value: String },
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid float {0:?}")]
    Float(String),
    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
    #[error("cipher: {0}")]
    Cipher(String),
}

/// Whole-operation failure while saving or loading a gallery.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery io: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity {0:?} cannot be persisted: it must be non-empty and free of `|` and line breaks")]
    InvalidId(String),
    #[error("sealing record for {id:?} failed: {reason}")]
    Seal { id: String, reason: String },
}

/// Failure reported by an external collaborator.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("image decode failed: {0}")]
    Decode(#[source] BoxError),
    #[error("face detection failed: {0}")]
    Detection(#[source] BoxError),
    #[error("descriptor extraction failed: {0}")]
    Extraction(#[source] BoxError),
}

/// Errors surfaced by [`FaceRecognition`](crate::FaceRecognition).
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("invalid identity {0:?}: must be non-empty and free of `|` and line breaks")]
    InvalidId(String),
    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

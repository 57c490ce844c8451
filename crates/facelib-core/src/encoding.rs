//! Face encoding: one identity's descriptor matrix.
//!
//! The embedding backend emits descriptors as a `rows × columns` matrix
//! (usually 1×D or D×1). Both dimensions are kept so that a persisted record
//! reconstructs exactly the shape it was created with.

use crate::error::ShapeMismatch;

/// An immutable face descriptor plus the identity it belongs to.
///
/// An empty `id` marks an anonymous (query) encoding. Changing the identity
/// or the values of an enrolled face means building a new `Encoding`.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    id: String,
    values: Vec<f32>,
    rows: usize,
    columns: usize,
}

impl Encoding {
    /// Build an encoding from the backend's matrix output.
    ///
    /// Fails with [`ShapeMismatch::Length`] unless `values.len() == rows * columns`
    /// and the shape is non-empty.
    pub fn from_matrix(
        values: Vec<f32>,
        rows: usize,
        columns: usize,
        id: Option<String>,
    ) -> Result<Self, ShapeMismatch> {
        let expected = rows.checked_mul(columns);
        if expected != Some(values.len()) || values.is_empty() {
            return Err(ShapeMismatch::Length {
                len: values.len(),
                rows,
                columns,
            });
        }
        Ok(Self {
            id: id.unwrap_or_default(),
            values,
            rows,
            columns,
        })
    }

    /// Copy of this encoding labelled with `id`.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    pub fn vector(&self) -> &[f32] {
        &self.values
    }

    /// Identity label; empty for anonymous encodings.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `(rows, columns)` of the descriptor matrix.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }

    /// Euclidean length of the element-wise difference to `other`.
    ///
    /// Accumulates and returns f64, so threshold comparisons see the unrounded
    /// value. Encodings of different shapes are not comparable, even when
    /// their value counts agree (1×128 vs 128×1).
    pub fn distance(&self, other: &Encoding) -> Result<f64, ShapeMismatch> {
        if self.dimensions() != other.dimensions() {
            return Err(ShapeMismatch::Dimensions {
                left: self.dimensions(),
                right: other.dimensions(),
            });
        }
        let sum: f64 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| {
                let d = f64::from(*a) - f64::from(*b);
                d * d
            })
            .sum();
        Ok(sum.sqrt())
    }
}

/// Whether `id` can label an enrolled face and survive the line-oriented gallery format.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['|', '\n', '\r'])
}

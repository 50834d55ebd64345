//! Unit-norm embedding vectors and their similarity.

use crate::error::{EmbeddingError, Result};

/// Accepted deviation of an embedding's L2 norm from 1.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// A dense embedding whose L2 norm is 1 within [`NORM_TOLERANCE`].
///
/// The invariant is checked on construction, so any value of this type can
/// be compared with a plain dot product.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    /// Wrap an already-normalized vector, rejecting it if it is not unit-norm.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        validate_components(&values)?;

        let norm = l2_norm(&values);
        if (norm - 1.0).abs() > NORM_TOLERANCE {
            return Err(EmbeddingError::NotNormalized { norm });
        }

        Ok(Self { values })
    }

    /// Scale a raw model output to unit length.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self> {
        validate_components(&values)?;

        let norm = l2_norm(&values);
        if norm == 0.0 {
            return Err(EmbeddingError::InvalidVector(
                "cannot normalize a zero vector".to_string(),
            ));
        }
        for x in values.iter_mut() {
            *x /= norm;
        }

        Self::new(values)
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// L2 norm, always 1 within tolerance.
    pub fn norm(&self) -> f32 {
        l2_norm(&self.values)
    }

    /// Similarity to another embedding of the same dimension.
    pub fn similarity(&self, other: &EmbeddingVector) -> Result<f32> {
        similarity(self, other)
    }
}

/// Similarity of two unit-norm vectors.
///
/// This is the dot product, which equals cosine similarity for unit-norm
/// inputs. Returns a value in `[-1.0, 1.0]`.
pub fn similarity(a: &EmbeddingVector, b: &EmbeddingVector) -> Result<f32> {
    dot_product(a.as_slice(), b.as_slice())
}

/// Compute the dot product between two slices.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn validate_components(values: &[f32]) -> Result<()> {
    if values.is_empty() {
        return Err(EmbeddingError::InvalidVector(
            "embedding has no components".to_string(),
        ));
    }

    for (i, v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(EmbeddingError::InvalidVector(format!(
                "non-finite value at index {i}"
            )));
        }
    }

    Ok(())
}

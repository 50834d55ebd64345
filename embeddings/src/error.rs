//! Error types for embeddings and the oracles that produce them.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while producing or comparing embeddings.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Two vectors of different length were compared.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector's L2 norm is outside the accepted tolerance.
    #[error("embedding is not unit-norm (norm = {norm})")]
    NotNormalized { norm: f32 },

    /// A vector cannot be normalized or contains NaN/infinite components.
    #[error("invalid embedding: {0}")]
    InvalidVector(String),

    /// Oracle returned a non-success status.
    #[error("oracle request failed: {0}")]
    OracleRequest(String),

    /// Oracle answered with a body we could not use.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),

    /// Oracle did not answer within the configured bound.
    #[error("oracle timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether a request flow may swallow this failure and degrade.
    ///
    /// Transport, timeout, response and I/O failures are per-request, and so
    /// is an unusable vector (zero, non-finite or not unit-norm) produced for
    /// one input. A dimension mismatch means the oracle is misconfigured and
    /// must surface.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::DimensionMismatch { .. })
    }
}

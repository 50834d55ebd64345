//! Error types for the search engine.

use thiserror::Error;

use jewel_catalogue::CatalogueError;
use jewel_embeddings::EmbeddingError;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur in the search engine.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Catalogue error.
    #[error("catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upload rejected before any work was done.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

impl SearchError {
    /// Whether the caller sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUpload(_)
                | Self::Catalogue(
                    CatalogueError::InvalidFilename(_) | CatalogueError::UnsupportedExtension(_)
                )
        )
    }

    /// Whether an oracle failure for this request caused this error.
    pub fn is_oracle_unavailable(&self) -> bool {
        match self {
            Self::Embedding(e) | Self::Catalogue(CatalogueError::Embedding(e)) => {
                e.is_recoverable()
            }
            _ => false,
        }
    }
}

//! Error types for the catalogue.

use thiserror::Error;

use jewel_embeddings::EmbeddingError;

/// Result type alias for catalogue operations.
pub type Result<T> = std::result::Result<T, CatalogueError>;

/// Errors that can occur while building, mutating or storing the catalogue.
#[derive(Error, Debug)]
pub enum CatalogueError {
    /// Embedding or oracle error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A storage directory could not be created.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Uploaded file name is unusable.
    #[error("invalid file name: {0:?}")]
    InvalidFilename(String),

    /// Uploaded file does not carry a supported image extension.
    #[error("unsupported image extension: {0:?}")]
    UnsupportedExtension(String),

    /// A staged image could not be moved into the catalogue.
    #[error("failed to persist image: {0}")]
    Persist(String),

    /// A path lies outside the static root and has no web path.
    #[error("path is outside the static root: {0}")]
    OutsideStaticRoot(String),

    /// Metal name not in the label set.
    #[error("unknown metal: {0:?}")]
    UnknownMetal(String),

    /// Prototype set is missing a label or mixes dimensions.
    #[error("invalid metal prototypes: {0}")]
    InvalidPrototypes(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogueError {
    /// Whether this error means the service is misconfigured.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Embedding(e) => !e.is_recoverable(),
            Self::CreateDirectory(_) | Self::InvalidPrototypes(_) => true,
            _ => false,
        }
    }
}

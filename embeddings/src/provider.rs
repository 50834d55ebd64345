//! Embedding oracles.
//!
//! The core never runs a model itself. It asks an [`EmbeddingOracle`] for
//! unit-norm vectors of images and text; the shipped implementation talks to
//! a vision-language model served over HTTP.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmbeddingError, Result};
use crate::http::{encode_image, post_json};
use crate::similarity::EmbeddingVector;
use crate::DEFAULT_DIMENSION;

/// Source of image and text embeddings that share one vector space.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Get the name of this oracle.
    fn name(&self) -> &str;

    /// Dimension of every vector this oracle returns.
    fn dimension(&self) -> usize;

    /// Embed a text string.
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed the image stored at `path`.
    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector>;
}

#[async_trait]
impl<T: EmbeddingOracle + ?Sized> EmbeddingOracle for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        (**self).embed_text(text).await
    }

    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector> {
        (**self).embed_image(path).await
    }
}

#[derive(Debug, Serialize)]
struct TextEmbeddingRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ImageEmbeddingRequest<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// Wire format of the embedding sidecar's answers.
#[derive(Debug, Deserialize)]
struct EmbeddingReply {
    embedding: Vec<f32>,
}

/// Embedding oracle backed by an HTTP model server.
///
/// Expects `POST {base}/embed/text` and `POST {base}/embed/image`, both
/// answering `{"embedding": [..]}`. Raw outputs are normalized here so the
/// rest of the system only sees unit-norm vectors.
pub struct HttpEmbeddingOracle {
    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model name forwarded to the server, if any.
    model: Option<String>,

    /// Expected output dimension.
    dimension: usize,
}

impl HttpEmbeddingOracle {
    /// Create an oracle for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            model: None,
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Set the model to request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the expected output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    fn vector_from_reply(&self, reply: EmbeddingReply) -> Result<EmbeddingVector> {
        if reply.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: reply.embedding.len(),
            });
        }
        EmbeddingVector::normalized(reply.embedding)
    }
}

#[async_trait]
impl EmbeddingOracle for HttpEmbeddingOracle {
    fn name(&self) -> &str {
        "http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        let body = TextEmbeddingRequest {
            text,
            model: self.model.as_deref(),
        };
        let reply: EmbeddingReply =
            post_json(&self.client, &self.base_url, "/embed/text", &body).await?;

        debug!("Embedded text ({} chars)", text.len());
        self.vector_from_reply(reply)
    }

    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector> {
        let body = ImageEmbeddingRequest {
            image: encode_image(path).await?,
            model: self.model.as_deref(),
        };
        let reply: EmbeddingReply =
            post_json(&self.client, &self.base_url, "/embed/image", &body).await?;

        debug!("Embedded image {}", path.display());
        self.vector_from_reply(reply)
    }
}

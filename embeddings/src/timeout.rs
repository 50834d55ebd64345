//! Bounded oracle calls.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{EmbeddingError, Result};
use crate::extraction::TextExtractor;
use crate::provider::EmbeddingOracle;
use crate::similarity::EmbeddingVector;

/// Wraps an oracle so that every call fails with
/// [`EmbeddingError::Timeout`] once `timeout` elapses.
pub struct WithTimeout<T> {
    inner: T,
    timeout: Duration,
}

impl<T> WithTimeout<T> {
    pub fn new(inner: T, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<F, R>(&self, operation: &str, future: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!("{operation} timed out after {timeout_ms}ms");
                Err(EmbeddingError::Timeout { timeout_ms })
            }
        }
    }
}

#[async_trait]
impl<T: EmbeddingOracle> EmbeddingOracle for WithTimeout<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        self.bounded("text embedding", self.inner.embed_text(text))
            .await
    }

    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector> {
        self.bounded("image embedding", self.inner.embed_image(path))
            .await
    }
}

#[async_trait]
impl<T: TextExtractor> TextExtractor for WithTimeout<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        self.bounded("text extraction", self.inner.extract_text(path))
            .await
    }
}

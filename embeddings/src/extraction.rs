//! Text extraction (OCR) oracles.
//!
//! Extracted text is only ever used as a display label for image queries;
//! it plays no part in ranking.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::http::{encode_image, post_json};

/// Best-effort text recognition over an image.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Get the name of this extractor.
    fn name(&self) -> &str;

    /// Return the text found in the image at `path`, possibly empty.
    async fn extract_text(&self, path: &Path) -> Result<String>;
}

#[async_trait]
impl<T: TextExtractor + ?Sized> TextExtractor for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        (**self).extract_text(path).await
    }
}

#[derive(Debug, Serialize)]
struct OcrRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct OcrReply {
    #[serde(default)]
    lines: Vec<String>,
}

/// OCR oracle backed by an HTTP server answering `POST {base}/ocr`
/// with `{"lines": [..]}`.
pub struct HttpTextExtractor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTextExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    fn name(&self) -> &str {
        "http"
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let body = OcrRequest {
            image: encode_image(path).await?,
        };
        let reply: OcrReply = post_json(&self.client, &self.base_url, "/ocr", &body).await?;

        debug!("OCR found {} lines in {}", reply.lines.len(), path.display());
        Ok(reply.lines.join(" ").trim().to_string())
    }
}

/// Extractor used when no OCR server is configured. Always finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTextExtractor;

#[async_trait]
impl TextExtractor for DisabledTextExtractor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn extract_text(&self, _path: &Path) -> Result<String> {
        Ok(String::new())
    }
}

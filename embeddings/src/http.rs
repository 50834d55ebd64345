//! Shared JSON transport for the oracle sidecars.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{EmbeddingError, Result};

/// POST `body` as JSON to `{base_url}{route}` and decode the JSON answer.
pub(crate) async fn post_json<B, T>(
    client: &reqwest::Client,
    base_url: &str,
    route: &str,
    body: &B,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let url = format!("{}{route}", base_url.trim_end_matches('/'));
    debug!("POST {url}");

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::OracleRequest(format!(
            "{url} returned {status}: {error_text}"
        )));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| EmbeddingError::InvalidResponse(format!("{url}: {e}")))
}

/// Read an image file and encode it for a JSON body.
pub(crate) async fn encode_image(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(STANDARD.encode(bytes))
}

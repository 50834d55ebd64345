//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use jewel_search::SearchError;

/// Result type alias for server setup.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that stop the server from starting or running.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::ServerConfig`].
    #[error("invalid config {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// CORS origin is not a valid header value.
    #[error("invalid CORS origin: {0:?}")]
    InvalidOrigin(String),

    /// Search engine initialization failed.
    #[error("search engine failed to initialize: {0}")]
    Startup(#[from] SearchError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned to HTTP clients as `{"status": "error", "error": ..}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Initialization has not finished.
    #[error("search engine is still initializing")]
    NotReady,

    /// The request itself is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// A search flow failed.
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Search(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Search(e) if e.is_oracle_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({status}): {self}");
        } else {
            warn!("Rejected request ({status}): {self}");
        }

        let body = Json(json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jewel_catalogue::CatalogueError;
    use jewel_embeddings::EmbeddingError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NotReady.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::BadRequest("no file".to_string()).status(),
            StatusCode::BAD_REQUEST
        );

        let unsupported =
            SearchError::from(CatalogueError::UnsupportedExtension("notes.txt".to_string()));
        assert_eq!(ApiError::from(unsupported).status(), StatusCode::BAD_REQUEST);

        let outage = SearchError::from(EmbeddingError::Timeout { timeout_ms: 10 });
        assert_eq!(ApiError::from(outage).status(), StatusCode::SERVICE_UNAVAILABLE);

        let persist = SearchError::from(CatalogueError::Persist("disk full".to_string()));
        assert_eq!(
            ApiError::from(persist).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! Server configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use jewel_search::SearchConfig;

use crate::error::{Result, ServerError};

/// Origins of the browser front-ends used during development.
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
];

/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: SocketAddr,

    /// Origins allowed to call the API from a browser.
    pub cors_origins: Vec<String>,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,

    /// Search engine configuration.
    pub search: SearchConfig,
}

impl ServerConfig {
    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ServerError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ServerError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Directory all static content is served from.
    pub fn static_dir(&self) -> &Path {
        &self.search.static_dir
    }

    /// Page served at `/`.
    pub fn index_page(&self) -> PathBuf {
        self.static_dir().join("index.html")
    }

    /// Page served at `/admin`.
    pub fn admin_page(&self) -> PathBuf {
        self.static_dir().join("admin.html")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(ToString::to_string).collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            search: SearchConfig::default(),
        }
    }
}

//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::ServerConfig;
use crate::error::Result;

/// Semantic image search over a jewelry catalogue.
#[derive(Debug, Parser)]
#[command(name = "jewel-server", version)]
pub struct Cli {
    /// TOML config file; flags below override its values.
    #[arg(long, short = 'c', env = "JEWEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address.
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Directory of static content; images live under `<dir>/images`.
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Base URL of the embedding server.
    #[arg(long)]
    pub embedding_url: Option<String>,

    /// Base URL of the OCR server.
    #[arg(long)]
    pub ocr_url: Option<String>,

    /// Oracle call timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Cli {
    /// Load the config file, if any, and apply the command-line overrides.
    pub fn load_config(&self) -> Result<ServerConfig> {
        let config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        Ok(self.apply(config))
    }

    fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = &self.static_dir {
            config.search.static_dir.clone_from(dir);
        }
        if let Some(url) = &self.embedding_url {
            config.search.oracle.embedding_url.clone_from(url);
        }
        if let Some(url) = &self.ocr_url {
            config.search.oracle.ocr_url = Some(url.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.search.oracle.timeout_ms = timeout_ms;
        }
        config
    }
}

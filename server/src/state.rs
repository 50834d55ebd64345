//! Shared request state and the readiness gate.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use jewel_search::{SearchEngine, SearchEngineBuilder};

use crate::error::{ApiError, Result};

/// State shared by all handlers.
///
/// The engine is absent until initialization completes. Handlers that need
/// it answer 503 until then.
#[derive(Clone, Default)]
pub struct AppState {
    engine: Arc<OnceCell<SearchEngine>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose engine is already initialized.
    pub fn ready(engine: SearchEngine) -> Self {
        Self {
            engine: Arc::new(OnceCell::new_with(Some(engine))),
        }
    }

    /// Run the initialization phase and publish the engine.
    ///
    /// Returns the number of indexed images.
    pub async fn initialize(&self, builder: SearchEngineBuilder) -> Result<usize> {
        let engine = self
            .engine
            .get_or_try_init(|| builder.initialize())
            .await?;
        let entries = engine.index().len().await;
        info!("Serving {entries} indexed images");
        Ok(entries)
    }

    pub fn is_ready(&self) -> bool {
        self.engine.initialized()
    }

    /// The engine, or [`ApiError::NotReady`] during initialization.
    pub fn engine(&self) -> std::result::Result<&SearchEngine, ApiError> {
        self.engine.get().ok_or(ApiError::NotReady)
    }
}

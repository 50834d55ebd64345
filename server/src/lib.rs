//! # Server
//!
//! HTTP boundary of the jewelry image search service.
//!
//! ## Endpoints
//!
//! - `POST /search` - text query, `{"query"}` → `{"images"}`
//! - `POST /search/image` - multipart image query → `{"query", "images"}`
//! - `POST /admin/upload` - multipart upload → `{"status", "metal"}`
//! - `POST /admin/reindex` - rebuild the catalogue from disk
//! - `GET /health` - readiness and catalogue size
//! - `GET /`, `GET /admin`, `GET /static/...` - front-end pages and images

pub mod cli;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use jewel_search::SearchEngineBuilder;

pub use cli::Cli;
pub use config::ServerConfig;
pub use error::{ApiError, Result, ServerError};
pub use state::AppState;

/// Build the router with all routes.
pub fn router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let api = Router::new()
        .route("/search", post(routes::search_text))
        .route("/search/image", post(routes::search_image))
        .route("/admin/upload", post(routes::upload))
        .route("/admin/reindex", post(routes::reindex))
        .route("/health", get(routes::health))
        .with_state(state);

    let router = Router::new()
        .merge(api)
        .route_service("/", ServeFile::new(config.index_page()))
        .route_service("/admin", ServeFile::new(config.admin_page()))
        .nest_service("/static", ServeDir::new(config.static_dir()))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins)?);

    Ok(router)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| ServerError::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Bind, start serving and initialize the engine in the background.
///
/// Requests that need the engine answer 503 until initialization finishes.
/// An initialization failure stops the server and is returned.
pub async fn run(config: ServerConfig, builder: SearchEngineBuilder) -> Result<()> {
    let state = AppState::new();
    let router = router(state.clone(), &config)?;

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Listening on {}", config.bind);

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    if let Err(e) = state.initialize(builder).await {
        error!("Startup failed: {e}");
        server.abort();
        return Err(e);
    }

    server.await.map_err(std::io::Error::other)??;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

//! HTTP handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use jewel_catalogue::{MetalLabel, RankedMatch};

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageSearchResponse {
    /// Text found in the image, or the fallback label.
    pub query: String,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub metal: MetalLabel,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
    pub status: String,
    pub indexed: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub ready: bool,
    pub entries: usize,
}

struct UploadedFile {
    filename: Option<String>,
    bytes: Bytes,
}

fn image_paths(matches: Vec<RankedMatch>) -> Vec<String> {
    matches.into_iter().map(|m| m.path).collect()
}

/// Pull the `file` field out of a multipart body, skipping any others.
async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        let filename = field.file_name().map(ToString::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        return Ok(UploadedFile { filename, bytes });
    }
    Err(ApiError::BadRequest(format!(
        "missing multipart field {FILE_FIELD:?}"
    )))
}

/// POST /search
pub async fn search_text(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let engine = state.engine()?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let matches = engine.text_search(&request.query).await?;
    Ok(Json(SearchResponse {
        images: image_paths(matches),
    }))
}

/// POST /search/image
pub async fn search_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImageSearchResponse>, ApiError> {
    let engine = state.engine()?;
    let file = read_file_field(&mut multipart).await?;

    let result = engine
        .image_search(file.bytes, file.filename.as_deref())
        .await?;
    Ok(Json(ImageSearchResponse {
        query: result.query,
        images: image_paths(result.matches),
    }))
}

/// POST /admin/upload
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let engine = state.engine()?;
    let file = read_file_field(&mut multipart).await?;
    let filename = file
        .filename
        .ok_or_else(|| ApiError::BadRequest("upload has no file name".to_string()))?;

    let result = engine.ingest(file.bytes, &filename).await?;
    Ok(Json(UploadResponse {
        status: "ok".to_string(),
        metal: result.metal,
    }))
}

/// POST /admin/reindex
pub async fn reindex(State(state): State<AppState>) -> Result<Json<ReindexResponse>, ApiError> {
    let engine = state.engine()?;
    let report = engine.reindex().await?;
    info!(
        "Reindexed {} images in {}ms",
        report.indexed, report.duration_ms
    );

    Ok(Json(ReindexResponse {
        status: "ok".to_string(),
        indexed: report.indexed,
        skipped: report.skipped,
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.engine() {
        Ok(engine) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                ready: true,
                entries: engine.index().len().await,
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "starting".to_string(),
                ready: false,
                entries: 0,
            }),
        ),
    }
}

//! Object routes: upload, download and delete by `/objects/<key>` path.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use std::convert::Infallible;
use serde::Serialize;
use tierstore_core::storage::object_path;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::{AppState, error::ApiError};

/// Maximum upload body size (50MB).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Creates the object routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/objects",
            post(upload_object)
                .layer::<_, Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES)),
        )
        .route("/objects/{*key}", get(download_object).delete(delete_object))
}

/// Response for a stored upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// `/objects/...` path of the new object.
    pub path: String,
}

/// POST `/objects`
/// Store the raw request body under a generated `uploads/<id>` key.
async fn upload_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    let size = body.len();

    let path = state.storage.upload_bytes(body, content_type).await?;
    info!(path = %path, size, "object uploaded");

    Ok((StatusCode::CREATED, Json(UploadResponse { path })))
}

/// GET `/objects/{*key}`
async fn download_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let download = state
        .storage
        .download_object(&object_path(&key), state.cache_ttl_secs)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, download.content_type),
            (header::CACHE_CONTROL, download.cache_control),
        ],
        download.body,
    ))
}

/// DELETE `/objects/{*key}`
async fn delete_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete(&object_path(&key)).await?;
    info!(key = %key, "object deleted");
    Ok(StatusCode::NO_CONTENT)
}

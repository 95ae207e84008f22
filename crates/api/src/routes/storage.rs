//! Storage introspection routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tierstore_core::storage::{ObjectMetadata, StorageStatus, object_path};

use crate::{AppState, error::ApiError};

/// Creates the storage routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/storage/status", get(storage_status))
        .route("/storage/objects", get(list_objects))
        .route("/storage/metadata/{*key}", get(object_metadata))
        .route("/storage/url/{*key}", get(object_url))
}

/// Query parameters for listing objects.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Key prefix, with or without the `/objects/` prefix.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Response for an object listing.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// `/objects/...` paths, sorted.
    pub objects: Vec<String>,
}

/// Response for an object URL.
#[derive(Debug, Serialize)]
pub struct UrlResponse {
    /// Signed URL on the cloud tier, `/storage/<key>` on the local tier.
    pub url: String,
}

/// GET `/storage/status`
async fn storage_status(State(state): State<AppState>) -> Json<StorageStatus> {
    Json(state.storage.status().await)
}

/// GET `/storage/objects?prefix=`
async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let prefix = query.prefix.unwrap_or_default();
    let objects = state.storage.list_objects(&prefix).await?;
    Ok(Json(ListResponse { objects }))
}

/// GET `/storage/metadata/{*key}`
async fn object_metadata(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ObjectMetadata>, ApiError> {
    let metadata = state.storage.get_metadata(&object_path(&key)).await?;
    Ok(Json(metadata))
}

/// GET `/storage/url/{*key}`
async fn object_url(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<UrlResponse>, ApiError> {
    let url = state.storage.get_url(&object_path(&key)).await?;
    Ok(Json(UrlResponse { url }))
}

//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - Object routes (`/objects/...`) for upload, download and delete
//! - Storage introspection routes under `/api/v1/storage`
//! - Mapping of storage outcomes onto HTTP status codes

pub mod error;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tierstore_core::storage::ObjectStorageService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Object storage service, bound to its tier once at startup.
    pub storage: Arc<ObjectStorageService>,
    /// `Cache-Control` max-age for object downloads, in seconds.
    pub cache_ttl_secs: u64,
}

impl AppState {
    /// Wrap a storage service, taking the download cache TTL from its config.
    pub fn new(storage: ObjectStorageService) -> Self {
        let cache_ttl_secs = storage.config().cache_ttl_secs;
        Self {
            storage: Arc::new(storage),
            cache_ttl_secs,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::object_routes())
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

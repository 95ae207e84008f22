//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod health;
pub mod objects;
pub mod storage;

/// Object routes, mounted at the root so paths read `/objects/<key>`.
pub fn object_routes() -> Router<AppState> {
    objects::routes()
}

/// Routes nested under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(storage::routes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use tempfile::TempDir;
    use tierstore_core::storage::{
        CloudProvider, LocalProvider, ObjectStorageService, SecondaryProvider, StorageConfig,
    };

    use crate::AppState;

    const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

    /// State bound to the local tier under a fresh temp dir.
    pub fn local_state() -> (TempDir, AppState) {
        let dir = TempDir::new().expect("tempdir");
        let service = ObjectStorageService::from_providers(
            StorageConfig::new(dir.path()).with_cache_ttl(600),
            CloudProvider::unavailable(SIGNED_URL_TTL),
            None,
            LocalProvider::new(dir.path()).expect("local provider"),
        );
        (dir, AppState::new(service))
    }

    /// State bound to an in-memory secondary tier with local fallback.
    pub fn secondary_state() -> (TempDir, AppState) {
        let dir = TempDir::new().expect("tempdir");
        let operator = opendal::Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        let service = ObjectStorageService::from_providers(
            StorageConfig::new(dir.path()),
            CloudProvider::unavailable(SIGNED_URL_TTL),
            Some(SecondaryProvider::with_operator(operator)),
            LocalProvider::new(dir.path()).expect("local provider"),
        );
        (dir, AppState::new(service))
    }
}

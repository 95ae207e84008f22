//! Secondary tier: an S3-compatible hosted store.
//!
//! Plain read/write/delete only. No content-type or cache headers are written
//! and no URLs are handed out.

use bytes::Bytes;
use opendal::{Operator, services};
use tracing::{debug, info};

use super::config::SecondaryConfig;
use super::error::StorageError;
use super::provider::{
    ObjectMetadata, ObjectStore, ProviderKind, delete_existing, list_keys, log_failure,
    stat_exists, stat_metadata,
};

/// Secondary storage adapter.
#[derive(Debug)]
pub struct SecondaryProvider {
    operator: Operator,
}

impl SecondaryProvider {
    /// Build the adapter for an S3-compatible endpoint.
    pub fn from_config(config: &SecondaryConfig) -> Result<Self, StorageError> {
        let builder = services::S3::default()
            .endpoint(&config.endpoint)
            .bucket(&config.bucket)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key)
            .region(&config.region);

        let operator = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        info!(endpoint = %config.endpoint, bucket = %config.bucket, "secondary storage configured");
        Ok(Self::with_operator(operator))
    }

    /// Adapter over an already-built operator.
    #[must_use]
    pub fn with_operator(operator: Operator) -> Self {
        Self { operator }
    }
}

impl ObjectStore for SecondaryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Secondary
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let size = data.len();
        self.operator
            .write(key, data)
            .await
            .map_err(|e| StorageError::from_backend(&e, key))
            .inspect_err(|e| log_failure(self.kind(), "upload", key, e))?;

        info!(key = %key, size, "secondary upload complete");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        self.operator
            .read(key)
            .await
            .map(|buffer| buffer.to_bytes())
            .map_err(|e| StorageError::from_backend(&e, key))
            .inspect_err(|e| log_failure(self.kind(), "download", key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        stat_exists(&self.operator, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "exists", key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        delete_existing(&self.operator, key)
            .await
            .inspect(|_| debug!(key = %key, "secondary object deleted"))
            .inspect_err(|e| log_failure(self.kind(), "delete", key, e))
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        stat_metadata(&self.operator, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "metadata", key, e))
    }

    async fn url(&self, _key: &str) -> Result<String, StorageError> {
        Err(StorageError::Unsupported(
            "secondary storage has no public URLs".to_string(),
        ))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        list_keys(&self.operator, prefix)
            .await
            .inspect_err(|e| log_failure(self.kind(), "list", prefix, e))
    }
}

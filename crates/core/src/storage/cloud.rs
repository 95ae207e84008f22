//! Cloud tier: a Google Cloud Storage bucket.

use std::time::Duration;

use bytes::Bytes;
use opendal::{Operator, services};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::credentials::Credentials;
use super::error::StorageError;
use super::path::content_type_for;
use super::provider::{
    ObjectMetadata, ObjectStore, ProviderKind, delete_existing, list_keys, log_failure,
    stat_exists, stat_metadata,
};

/// Cache hint written with every cloud upload.
pub const UPLOAD_CACHE_CONTROL: &str = "public, max-age=3600";

/// Availability report for the cloud tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudStatus {
    /// Whether the bucket was initialized.
    pub available: bool,
    /// Bucket name, when initialized.
    pub bucket: Option<String>,
}

/// Cloud storage adapter.
///
/// Availability is decided once at construction. Every operation on an
/// uninitialized adapter returns [`StorageError::Unavailable`].
#[derive(Debug)]
pub struct CloudProvider {
    operator: Option<Operator>,
    bucket: Option<String>,
    signed_url_ttl: Duration,
}

impl CloudProvider {
    /// Initialize against GCS. Missing or unusable credentials leave the
    /// adapter unavailable rather than failing.
    #[must_use]
    pub fn initialize(
        credentials: Option<&Credentials>,
        bucket_override: Option<&str>,
        signed_url_ttl: Duration,
    ) -> Self {
        let Some(credentials) = credentials else {
            warn!("cloud storage disabled: no credentials");
            return Self::unavailable(signed_url_ttl);
        };

        let bucket = bucket_override.map_or_else(|| credentials.default_bucket(), String::from);

        match Self::create_operator(credentials, &bucket) {
            Ok(operator) => {
                info!(bucket = %bucket, source = %credentials.source(), "cloud storage initialized");
                Self::with_operator(operator, bucket, signed_url_ttl)
            }
            Err(e) => {
                error!(bucket = %bucket, error = %e, "cloud storage initialization failed");
                Self::unavailable(signed_url_ttl)
            }
        }
    }

    /// Adapter over an already-built operator.
    #[must_use]
    pub fn with_operator(operator: Operator, bucket: impl Into<String>, signed_url_ttl: Duration) -> Self {
        Self {
            operator: Some(operator),
            bucket: Some(bucket.into()),
            signed_url_ttl,
        }
    }

    /// Adapter that was never initialized.
    #[must_use]
    pub fn unavailable(signed_url_ttl: Duration) -> Self {
        Self {
            operator: None,
            bucket: None,
            signed_url_ttl,
        }
    }

    fn create_operator(credentials: &Credentials, bucket: &str) -> Result<Operator, StorageError> {
        let builder = services::Gcs::default()
            .bucket(bucket)
            .credential(&credentials.encoded());

        Ok(Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish())
    }

    fn operator(&self) -> Result<&Operator, StorageError> {
        self.operator
            .as_ref()
            .ok_or_else(|| StorageError::unavailable(ProviderKind::Cloud.name()))
    }

    /// Availability and bucket name.
    #[must_use]
    pub fn status(&self) -> CloudStatus {
        CloudStatus {
            available: self.is_available(),
            bucket: self.bucket.clone(),
        }
    }

    /// Bucket name, when initialized.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }
}

impl ObjectStore for CloudProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn is_available(&self) -> bool {
        self.operator.is_some()
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let operator = self.operator()?;
        let content_type = content_type.map_or_else(|| content_type_for(key), String::from);
        let size = data.len();

        let capability = operator.info().full_capability();
        let mut write = operator.write_with(key, data);
        if capability.write_with_content_type {
            write = write.content_type(&content_type);
        }
        if capability.write_with_cache_control {
            write = write.cache_control(UPLOAD_CACHE_CONTROL);
        }

        write
            .await
            .map_err(|e| StorageError::from_backend(&e, key))
            .inspect_err(|e| log_failure(self.kind(), "upload", key, e))?;

        info!(key = %key, size, content_type = %content_type, "cloud upload complete");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        self.operator()?
            .read(key)
            .await
            .map(|buffer| buffer.to_bytes())
            .map_err(|e| StorageError::from_backend(&e, key))
            .inspect_err(|e| log_failure(self.kind(), "download", key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        stat_exists(self.operator()?, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "exists", key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        delete_existing(self.operator()?, key)
            .await
            .inspect(|_| debug!(key = %key, "cloud object deleted"))
            .inspect_err(|e| log_failure(self.kind(), "delete", key, e))
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        stat_metadata(self.operator()?, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "metadata", key, e))
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        let presigned = self
            .operator()?
            .presign_read(key, self.signed_url_ttl)
            .await
            .map_err(|e| StorageError::from_backend(&e, key))
            .inspect_err(|e| log_failure(self.kind(), "url", key, e))?;

        Ok(presigned.uri().to_string())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        list_keys(self.operator()?, prefix)
            .await
            .inspect_err(|e| log_failure(self.kind(), "list", prefix, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_cloud() -> CloudProvider {
        let operator = Operator::new(services::Memory::default())
            .expect("memory operator")
            .finish();
        CloudProvider::with_operator(operator, "test-bucket", Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_unavailable_without_credentials() {
        let cloud = CloudProvider::initialize(None, None, Duration::from_secs(3600));
        assert!(!cloud.is_available());
        assert_eq!(
            cloud.status(),
            CloudStatus {
                available: false,
                bucket: None
            }
        );

        let err = cloud.download("uploads/a").await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(cloud.exists("uploads/a").await.unwrap_err().is_unavailable());
        assert!(cloud.url("uploads/a").await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cloud = memory_cloud();
        cloud
            .upload("uploads/a.png", Bytes::from_static(b"png-bytes"), None)
            .await
            .expect("upload");

        assert!(cloud.exists("uploads/a.png").await.expect("exists"));
        let bytes = cloud.download("uploads/a.png").await.expect("download");
        assert_eq!(bytes.as_ref(), b"png-bytes");

        let meta = cloud.metadata("uploads/a.png").await.expect("metadata");
        assert_eq!(meta.size, 9);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let cloud = memory_cloud();
        assert!(!cloud.exists("uploads/missing").await.expect("exists"));
        assert!(cloud.download("uploads/missing").await.unwrap_err().is_not_found());
        assert!(cloud.metadata("uploads/missing").await.unwrap_err().is_not_found());
        assert!(cloud.delete("uploads/missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_then_exists() {
        let cloud = memory_cloud();
        cloud
            .upload("uploads/b", Bytes::from_static(b"b"), Some("text/plain"))
            .await
            .expect("upload");
        cloud.delete("uploads/b").await.expect("delete");
        assert!(!cloud.exists("uploads/b").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let cloud = memory_cloud();
        for key in ["uploads/a", "uploads/b", "avatars/c"] {
            cloud
                .upload(key, Bytes::from_static(b"x"), None)
                .await
                .expect("upload");
        }

        let keys = cloud.list("uploads").await.expect("list");
        assert_eq!(keys, vec!["uploads/a".to_string(), "uploads/b".to_string()]);

        // Raw key prefixes, not only directory names.
        assert_eq!(cloud.list("upl").await.expect("list"), keys);
        assert_eq!(cloud.list("uploads/a").await.expect("list"), vec!["uploads/a"]);
        assert_eq!(cloud.list("").await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn test_status_reports_bucket() {
        let cloud = memory_cloud();
        assert_eq!(cloud.bucket(), Some("test-bucket"));
        assert!(cloud.status().available);
    }
}

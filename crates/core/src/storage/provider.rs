//! Backend capability set and the closed set of providers implementing it.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use opendal::{ErrorKind, Operator};
use serde::Serialize;
use tracing::{debug, error};

use super::cloud::CloudProvider;
use super::error::StorageError;
use super::local::LocalProvider;
use super::path::listing_root;
use super::secondary::SecondaryProvider;

/// Storage tiers, in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Cloud Storage bucket.
    Cloud,
    /// Secondary hosted object store.
    Secondary,
    /// Local filesystem.
    Local,
}

impl ProviderKind {
    /// Short provider name used in logs and status output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cloud => "gcs",
            Self::Secondary => "secondary",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    /// Object size in bytes.
    pub size: u64,
    /// Creation time, when the backend records it.
    pub created: Option<DateTime<Utc>>,
    /// Last modification time, when the backend records it.
    pub modified: Option<DateTime<Utc>>,
    /// Content type, when the backend records it.
    pub content_type: Option<String>,
}

/// Capability set shared by every storage backend.
///
/// Keys are bare backend keys (no `/objects/` prefix). Backend errors are
/// translated into [`StorageError`] before they leave an implementation.
pub trait ObjectStore: Send + Sync {
    /// Which tier this store is.
    fn kind(&self) -> ProviderKind;

    /// Whether the backend finished initialization.
    fn is_available(&self) -> bool;

    /// Write `data` under `key`.
    fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Read the full object into memory.
    fn download(&self, key: &str) -> impl Future<Output = Result<Bytes, StorageError>> + Send;

    /// Check whether `key` exists. A missing object is `Ok(false)`.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Delete `key`. Deleting a missing object is `NotFound`.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Fetch object metadata.
    fn metadata(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<ObjectMetadata, StorageError>> + Send;

    /// Resolve a URL for `key`.
    fn url(&self, key: &str) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// List keys below `prefix`, recursively.
    fn list(&self, prefix: &str)
    -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}

/// One of the three storage tiers.
#[derive(Debug)]
pub enum Provider {
    /// Cloud bucket.
    Cloud(CloudProvider),
    /// Secondary hosted store.
    Secondary(SecondaryProvider),
    /// Local filesystem.
    Local(LocalProvider),
}

impl ObjectStore for Provider {
    fn kind(&self) -> ProviderKind {
        match self {
            Self::Cloud(p) => p.kind(),
            Self::Secondary(p) => p.kind(),
            Self::Local(p) => p.kind(),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            Self::Cloud(p) => p.is_available(),
            Self::Secondary(p) => p.is_available(),
            Self::Local(p) => p.is_available(),
        }
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        match self {
            Self::Cloud(p) => p.upload(key, data, content_type).await,
            Self::Secondary(p) => p.upload(key, data, content_type).await,
            Self::Local(p) => p.upload(key, data, content_type).await,
        }
    }

    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        match self {
            Self::Cloud(p) => p.download(key).await,
            Self::Secondary(p) => p.download(key).await,
            Self::Local(p) => p.download(key).await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self {
            Self::Cloud(p) => p.exists(key).await,
            Self::Secondary(p) => p.exists(key).await,
            Self::Local(p) => p.exists(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Self::Cloud(p) => p.delete(key).await,
            Self::Secondary(p) => p.delete(key).await,
            Self::Local(p) => p.delete(key).await,
        }
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        match self {
            Self::Cloud(p) => p.metadata(key).await,
            Self::Secondary(p) => p.metadata(key).await,
            Self::Local(p) => p.metadata(key).await,
        }
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        match self {
            Self::Cloud(p) => p.url(key).await,
            Self::Secondary(p) => p.url(key).await,
            Self::Local(p) => p.url(key).await,
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        match self {
            Self::Cloud(p) => p.list(prefix).await,
            Self::Secondary(p) => p.list(prefix).await,
            Self::Local(p) => p.list(prefix).await,
        }
    }
}

/// Log a failed adapter call. Missing objects are routine and stay at debug.
pub(crate) fn log_failure(provider: ProviderKind, operation: &str, key: &str, err: &StorageError) {
    if err.is_not_found() {
        debug!(provider = %provider, operation, key = %key, "object not found");
    } else {
        error!(provider = %provider, operation, key = %key, error = %err, "storage operation failed");
    }
}

/// `stat` with a missing object mapped to `Ok(false)`. Directories are not objects.
pub(crate) async fn stat_exists(operator: &Operator, key: &str) -> Result<bool, StorageError> {
    match operator.stat(key).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::from_backend(&e, key)),
    }
}

/// Metadata straight from the backend's `stat`.
pub(crate) async fn stat_metadata(
    operator: &Operator,
    key: &str,
) -> Result<ObjectMetadata, StorageError> {
    let meta = operator
        .stat(key)
        .await
        .map_err(|e| StorageError::from_backend(&e, key))?;
    if !meta.is_file() {
        return Err(StorageError::not_found(key));
    }

    Ok(ObjectMetadata {
        size: meta.content_length(),
        created: None,
        modified: meta
            .last_modified()
            .and_then(|t| parse_backend_timestamp(&t.to_string())),
        content_type: meta.content_type().map(String::from),
    })
}

/// Delete that reports a missing object instead of silently succeeding.
pub(crate) async fn delete_existing(operator: &Operator, key: &str) -> Result<(), StorageError> {
    if !stat_exists(operator, key).await? {
        return Err(StorageError::not_found(key));
    }
    operator
        .delete(key)
        .await
        .map_err(|e| StorageError::from_backend(&e, key))
}

/// Recursive listing of every key that starts with `prefix`, files only.
pub(crate) async fn list_keys(operator: &Operator, prefix: &str) -> Result<Vec<String>, StorageError> {
    let prefix = prefix.trim_start_matches('/');
    let mut keys = list_files(operator, parent_dir(prefix)).await?;
    keys.retain(|key| key.starts_with(prefix));
    Ok(keys)
}

/// Recursive listing of the directory named by `prefix`, files only.
pub(crate) async fn list_dir_keys(
    operator: &Operator,
    prefix: &str,
) -> Result<Vec<String>, StorageError> {
    list_files(operator, &listing_root(prefix)).await
}

async fn list_files(operator: &Operator, root: &str) -> Result<Vec<String>, StorageError> {
    let entries = match operator.list_with(root).recursive(true).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::from(e)),
    };

    let mut keys: Vec<String> = entries
        .into_iter()
        .map(|entry| entry.path().trim_start_matches('/').to_string())
        .filter(|path| !path.is_empty() && !path.ends_with('/'))
        .collect();
    keys.sort();
    Ok(keys)
}

/// Deepest directory that can hold keys starting with `prefix`.
fn parent_dir(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(idx) => &prefix[..=idx],
        None => "/",
    }
}

/// Backends render timestamps either as RFC 3339 or as `YYYY-MM-DD HH:MM:SS UTC`.
pub(crate) fn parse_backend_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f UTC")
        .ok()
        .map(|t| t.and_utc())
}

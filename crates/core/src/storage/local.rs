//! Local filesystem tier.
//!
//! Each object is a regular file at `<root>/<key>`. A sidecar JSON file at
//! `<root>/<key>.meta` records `{created, modified, size, type}` so the
//! timestamps survive copies that reset filesystem times.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::{Operator, services};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::StorageError;
use super::path::content_type_for;
use super::provider::{
    ObjectMetadata, ObjectStore, ProviderKind, delete_existing, list_dir_keys, log_failure,
    stat_exists, stat_metadata,
};

/// Suffix of sidecar metadata files.
pub const METADATA_SUFFIX: &str = ".meta";

/// Prefix of the local URL convention. Not a fetchable network URL.
pub const LOCAL_URL_PREFIX: &str = "/storage/";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SidecarMetadata {
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    size: u64,
    #[serde(rename = "type")]
    content_type: String,
}

/// Disk usage of the local tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalUsage {
    /// Root directory.
    pub root: String,
    /// Number of stored objects (sidecars excluded).
    pub file_count: usize,
    /// Sum of object sizes in bytes.
    pub total_size: u64,
}

/// Local filesystem adapter.
#[derive(Debug)]
pub struct LocalProvider {
    operator: Operator,
    root: PathBuf,
}

impl LocalProvider {
    /// Open (and create if needed) the directory tree at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::configuration(format!("cannot create {}: {e}", root.display()))
        })?;

        let builder = services::Fs::default().root(
            root.to_str()
                .ok_or_else(|| StorageError::configuration("invalid path"))?,
        );
        let operator = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        info!(root = %root.display(), "local storage ready");
        Ok(Self { operator, root })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Count objects and sum their sizes.
    pub async fn usage(&self) -> Result<LocalUsage, StorageError> {
        let keys = self.list("").await?;
        let mut total_size = 0;
        for key in &keys {
            match self.operator.stat(key).await {
                Ok(meta) => total_size += meta.content_length(),
                Err(e) => warn!(key = %key, error = %e, "skipping object in usage report"),
            }
        }

        Ok(LocalUsage {
            root: self.root.display().to_string(),
            file_count: keys.len(),
            total_size,
        })
    }

    /// `NotFound` unless `key` names a regular, non-sidecar file.
    async fn ensure_object(&self, key: &str) -> Result<(), StorageError> {
        if is_sidecar(key) || !stat_exists(&self.operator, key).await? {
            return Err(StorageError::not_found(key));
        }
        Ok(())
    }

    async fn read_sidecar(&self, key: &str) -> Option<SidecarMetadata> {
        let raw = self.operator.read(&sidecar_key(key)).await.ok()?;
        match serde_json::from_slice(&raw.to_vec()) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unreadable metadata sidecar");
                None
            }
        }
    }

    async fn write_sidecar(&self, key: &str, size: u64, content_type: &str) {
        let now = Utc::now();
        let created = self
            .read_sidecar(key)
            .await
            .map_or(now, |existing| existing.created);
        let sidecar = SidecarMetadata {
            created,
            modified: now,
            size,
            content_type: content_type.to_string(),
        };

        let result = match serde_json::to_vec_pretty(&sidecar) {
            Ok(json) => self
                .operator
                .write(&sidecar_key(key), json)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "failed to write metadata sidecar");
        }
    }
}

impl ObjectStore for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        if is_sidecar(key) {
            return Err(StorageError::invalid_key(format!(
                "keys ending in {METADATA_SUFFIX} are reserved: {key}"
            )));
        }

        let size = data.len() as u64;
        let content_type = content_type.map_or_else(|| content_type_for(key), String::from);

        self.operator
            .write(key, data)
            .await
            .map_err(|e| StorageError::from_backend(&e, key))
            .inspect_err(|e| log_failure(self.kind(), "upload", key, e))?;
        self.write_sidecar(key, size, &content_type).await;

        info!(key = %key, size, "local upload complete");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        let read = async {
            self.ensure_object(key).await?;
            self.operator
                .read(key)
                .await
                .map(|buffer| buffer.to_bytes())
                .map_err(|e| StorageError::from_backend(&e, key))
        };
        read.await
            .inspect_err(|e| log_failure(self.kind(), "download", key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        if is_sidecar(key) {
            return Ok(false);
        }
        stat_exists(&self.operator, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "exists", key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if is_sidecar(key) {
            return Err(StorageError::not_found(key));
        }
        delete_existing(&self.operator, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "delete", key, e))?;

        if let Err(e) = self.operator.delete(&sidecar_key(key)).await {
            warn!(key = %key, error = %e, "failed to remove metadata sidecar");
        }
        debug!(key = %key, "local object deleted");
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        if is_sidecar(key) {
            return Err(StorageError::not_found(key));
        }
        let stat = stat_metadata(&self.operator, key)
            .await
            .inspect_err(|e| log_failure(self.kind(), "metadata", key, e))?;

        Ok(match self.read_sidecar(key).await {
            Some(sidecar) => ObjectMetadata {
                size: sidecar.size,
                created: Some(sidecar.created),
                modified: Some(sidecar.modified),
                content_type: Some(sidecar.content_type),
            },
            None => ObjectMetadata {
                content_type: Some(content_type_for(key)),
                ..stat
            },
        })
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("{LOCAL_URL_PREFIX}{key}"))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let keys = list_dir_keys(&self.operator, prefix)
            .await
            .inspect_err(|e| log_failure(self.kind(), "list", prefix, e))?;

        Ok(keys
            .into_iter()
            .filter(|key| !is_sidecar(key))
            .collect())
    }
}

fn is_sidecar(key: &str) -> bool {
    key.ends_with(METADATA_SUFFIX)
}

fn sidecar_key(key: &str) -> String {
    format!("{key}{METADATA_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local() -> (TempDir, LocalProvider) {
        let dir = TempDir::new().expect("tempdir");
        let provider = LocalProvider::new(dir.path()).expect("local provider");
        (dir, provider)
    }

    #[tokio::test]
    async fn test_creates_missing_root() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("nested").join("storage");
        let provider = LocalProvider::new(&root).expect("local provider");
        assert!(root.is_dir());
        assert_eq!(provider.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_upload_writes_object_and_sidecar() {
        let (dir, provider) = local();
        provider
            .upload("uploads/a/b.txt", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .expect("upload");

        let object = dir.path().join("uploads/a/b.txt");
        let sidecar = dir.path().join("uploads/a/b.txt.meta");
        assert_eq!(std::fs::read(&object).expect("object"), b"hello");

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&sidecar).expect("sidecar")).expect("json");
        assert_eq!(json["size"], 5);
        assert_eq!(json["type"], "text/plain");
        assert!(json["created"].is_string());
        assert!(json["modified"].is_string());
    }

    #[tokio::test]
    async fn test_metadata_prefers_sidecar() {
        let (_dir, provider) = local();
        provider
            .upload("uploads/doc", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .expect("upload");

        let meta = provider.metadata("uploads/doc").await.expect("metadata");
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert!(meta.created.is_some());
        assert!(meta.modified.is_some());
    }

    #[tokio::test]
    async fn test_metadata_without_sidecar_falls_back_to_stat() {
        let (dir, provider) = local();
        std::fs::write(dir.path().join("copied.png"), b"1234567").expect("write");

        let meta = provider.metadata("copied.png").await.expect("metadata");
        assert_eq!(meta.size, 7);
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
        assert!(meta.created.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_created() {
        let (_dir, provider) = local();
        provider
            .upload("uploads/doc", Bytes::from_static(b"v1"), None)
            .await
            .expect("upload v1");
        let first = provider.metadata("uploads/doc").await.expect("metadata");

        provider
            .upload("uploads/doc", Bytes::from_static(b"version2"), None)
            .await
            .expect("upload v2");
        let second = provider.metadata("uploads/doc").await.expect("metadata");

        assert_eq!(first.created, second.created);
        assert_eq!(second.size, 8);
    }

    #[tokio::test]
    async fn test_delete_removes_sidecar() {
        let (dir, provider) = local();
        provider
            .upload("uploads/doc", Bytes::from_static(b"x"), None)
            .await
            .expect("upload");

        provider.delete("uploads/doc").await.expect("delete");
        assert!(!provider.exists("uploads/doc").await.expect("exists"));
        assert!(!dir.path().join("uploads/doc.meta").exists());
        assert!(provider.delete("uploads/doc").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_excludes_sidecars() {
        let (_dir, provider) = local();
        for key in ["uploads/a", "uploads/nested/b", "avatars/c.png"] {
            provider
                .upload(key, Bytes::from_static(b"x"), None)
                .await
                .expect("upload");
        }

        let all = provider.list("").await.expect("list");
        assert_eq!(all, vec!["avatars/c.png", "uploads/a", "uploads/nested/b"]);

        let uploads = provider.list("uploads").await.expect("list");
        assert_eq!(uploads, vec!["uploads/a", "uploads/nested/b"]);

        assert!(provider.list("missing").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_reserved_suffix_rejected() {
        let (_dir, provider) = local();
        let err = provider
            .upload("uploads/x.meta", Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_url_convention() {
        let (_dir, provider) = local();
        assert_eq!(
            provider.url("uploads/a").await.expect("url"),
            "/storage/uploads/a"
        );
    }

    #[tokio::test]
    async fn test_usage() {
        let (dir, provider) = local();
        provider
            .upload("uploads/a", Bytes::from_static(b"hello"), None)
            .await
            .expect("upload");
        provider
            .upload("uploads/b", Bytes::from_static(b"abc"), None)
            .await
            .expect("upload");

        let usage = provider.usage().await.expect("usage");
        assert_eq!(usage.file_count, 2);
        assert_eq!(usage.total_size, 8);
        assert_eq!(usage.root, dir.path().display().to_string());
    }

    #[tokio::test]
    async fn test_sidecar_not_addressable() {
        let (dir, provider) = local();
        provider
            .upload("uploads/doc.txt", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .expect("upload");

        let sidecar = "uploads/doc.txt.meta";
        assert!(!provider.exists(sidecar).await.expect("exists"));
        assert!(provider.download(sidecar).await.unwrap_err().is_not_found());
        assert!(provider.metadata(sidecar).await.unwrap_err().is_not_found());
        assert!(provider.delete(sidecar).await.unwrap_err().is_not_found());

        assert!(dir.path().join(sidecar).is_file());
        let meta = provider.metadata("uploads/doc.txt").await.expect("metadata");
        assert!(meta.created.is_some());
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_directory_is_not_an_object() {
        let (dir, provider) = local();
        provider
            .upload("uploads/nested/a", Bytes::from_static(b"x"), None)
            .await
            .expect("upload");

        for key in ["uploads", "uploads/nested"] {
            assert!(!provider.exists(key).await.expect("exists"));
            assert!(provider.download(key).await.unwrap_err().is_not_found());
            assert!(provider.metadata(key).await.unwrap_err().is_not_found());
            assert!(provider.delete(key).await.unwrap_err().is_not_found());
        }
        assert!(dir.path().join("uploads/nested/a").is_file());
    }
}

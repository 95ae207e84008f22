//! Object storage service: tier selection and fallback.

use std::future::Future;

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::cloud::{CloudProvider, CloudStatus};
use super::config::{StorageConfig, cache_control};
use super::credentials::CredentialSources;
use super::error::StorageError;
use super::local::{LocalProvider, LocalUsage};
use super::path::{
    OBJECTS_PREFIX, UPLOADS_NAMESPACE, content_type_for, normalize_object_entity_path, object_key,
    object_path,
};
use super::provider::{ObjectMetadata, ObjectStore, Provider, ProviderKind};
use super::secondary::SecondaryProvider;

/// An object fetched for download, with the headers it should be served with.
#[derive(Debug, Clone)]
pub struct ObjectDownload {
    /// Backend key.
    pub key: String,
    /// Object bytes.
    pub body: Bytes,
    /// `Content-Type`, inferred from the key's extension.
    pub content_type: String,
    /// `Cache-Control`, e.g. `public, max-age=3600`.
    pub cache_control: String,
    /// Tier that served the object.
    pub provider: ProviderKind,
}

/// Snapshot of the tier binding.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStatus {
    /// Tier serving every request.
    pub active: ProviderKind,
    /// Tier tried once when a read on the active tier fails.
    pub fallback: Option<ProviderKind>,
    /// Cloud tier availability.
    pub cloud: CloudStatus,
    /// Whether a secondary store was configured.
    pub secondary_configured: bool,
    /// Local tier usage, when the local tier is bound.
    pub local: Option<LocalUsage>,
}

/// Tiered object storage.
///
/// The active tier is chosen once at construction (Cloud > Secondary > Local)
/// and never changes. Reads (`download_object`, `download_bytes`, `exists`,
/// `get_metadata`) retry once on the next configured tier; uploads, deletes and
/// URL resolution go to the active tier only.
#[derive(Debug)]
pub struct ObjectStorageService {
    active: Provider,
    fallback: Option<Provider>,
    cloud_status: CloudStatus,
    secondary_configured: bool,
    config: StorageConfig,
}

impl ObjectStorageService {
    /// Resolve credentials from the environment, check every tier and bind.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local tier cannot be opened.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let sources = CredentialSources::from_env();
        let credentials = sources.resolve();
        let bucket = sources.bucket.as_deref().or(config.cloud_bucket.as_deref());
        let cloud = CloudProvider::initialize(credentials.as_ref(), bucket, config.signed_url_ttl());

        let secondary = config.secondary.as_ref().and_then(|settings| {
            SecondaryProvider::from_config(settings)
                .inspect_err(|e| error!(error = %e, "secondary storage disabled"))
                .ok()
        });

        let local = LocalProvider::new(&config.local_root)?;

        Ok(Self::from_providers(config, cloud, secondary, local))
    }

    /// Bind to the highest-priority available tier.
    ///
    /// The fallback is the next configured tier below the active one.
    #[must_use]
    pub fn from_providers(
        config: StorageConfig,
        cloud: CloudProvider,
        secondary: Option<SecondaryProvider>,
        local: LocalProvider,
    ) -> Self {
        let cloud_status = cloud.status();
        let secondary_configured = secondary.is_some();

        let (active, fallback) = match (cloud.is_available(), secondary) {
            (true, Some(secondary)) => (
                Provider::Cloud(cloud),
                Some(Provider::Secondary(secondary)),
            ),
            (true, None) => (Provider::Cloud(cloud), Some(Provider::Local(local))),
            (false, Some(secondary)) => (
                Provider::Secondary(secondary),
                Some(Provider::Local(local)),
            ),
            (false, None) => (Provider::Local(local), None),
        };

        info!(
            provider = %active.kind(),
            fallback = ?fallback.as_ref().map(ObjectStore::kind),
            "object storage provider selected"
        );

        Self {
            active,
            fallback,
            cloud_status,
            secondary_configured,
            config,
        }
    }

    /// Tier serving every request.
    #[must_use]
    pub fn active_provider(&self) -> ProviderKind {
        self.active.kind()
    }

    /// Tier tried once when a read on the active tier fails.
    #[must_use]
    pub fn fallback_provider(&self) -> Option<ProviderKind> {
        self.fallback.as_ref().map(ObjectStore::kind)
    }

    /// The configuration the service was built with.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Store `data` under a fresh `uploads/<uuid>` key and return its
    /// `/objects/...` path.
    ///
    /// # Errors
    ///
    /// Returns the active tier's error; no path is handed out for a failed write.
    pub async fn upload_bytes(
        &self,
        data: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = format!("{UPLOADS_NAMESPACE}/{}", Uuid::new_v4());
        let content_type = Some(content_type).filter(|ct| !ct.is_empty());

        self.active
            .upload(&key, data.into(), content_type)
            .await
            .inspect_err(|e| error!(key = %key, provider = %self.active.kind(), error = %e, "upload failed"))?;

        Ok(object_path(&key))
    }

    /// Fetch an object together with the headers it should be served with.
    ///
    /// A failure on the active tier is retried once on the fallback tier. The
    /// final error is `NotFound` when any tier reported the object missing and
    /// `Unavailable` otherwise.
    pub async fn download_object(
        &self,
        path: &str,
        cache_ttl_secs: u64,
    ) -> Result<ObjectDownload, StorageError> {
        let key = object_key(path)?;
        let (body, provider) = self
            .read_with_fallback("download", key, |p| p.download(key))
            .await?;

        Ok(ObjectDownload {
            key: key.to_string(),
            body,
            content_type: content_type_for(key),
            cache_control: cache_control(cache_ttl_secs),
            provider,
        })
    }

    /// Object bytes, with the same fallback as [`Self::download_object`].
    pub async fn download_bytes(&self, path: &str) -> Result<Bytes, StorageError> {
        let key = object_key(path)?;
        self.read_with_fallback("download", key, |p| p.download(key))
            .await
            .map(|(body, _)| body)
    }

    /// Whether the object exists on the active tier or, failing that, on the
    /// fallback tier. Invalid paths and backend failures read as `false`.
    pub async fn exists(&self, path: &str) -> bool {
        let Ok(key) = object_key(path) else {
            return false;
        };

        self.read_with_fallback("exists", key, |p| async move {
            match p.exists(key).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(StorageError::not_found(key)),
                Err(e) => Err(e),
            }
        })
        .await
        .is_ok()
    }

    /// Object metadata, with the same fallback as [`Self::download_object`].
    pub async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        let key = object_key(path)?;
        self.read_with_fallback("metadata", key, |p| p.metadata(key))
            .await
            .map(|(meta, _)| meta)
    }

    /// Delete an object from the active tier.
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = object_key(path)?;
        self.active.delete(key).await
    }

    /// URL for an object on the active tier: a signed URL on the cloud tier,
    /// `/storage/<key>` on the local tier, unsupported on the secondary tier.
    pub async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        let key = object_key(path)?;
        self.active.url(key).await
    }

    /// `/objects/...` paths of every object below `prefix` on the active tier.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = prefix.strip_prefix(OBJECTS_PREFIX).unwrap_or(prefix);
        let keys = self.active.list(prefix).await?;
        Ok(keys.iter().map(|key| object_path(key)).collect())
    }

    /// Canonicalize a raw object reference. See
    /// [`normalize_object_entity_path`].
    #[must_use]
    pub fn normalize_object_entity_path(&self, raw: &str) -> String {
        normalize_object_entity_path(raw)
    }

    /// Report the tier binding.
    pub async fn status(&self) -> StorageStatus {
        let local = match (&self.active, &self.fallback) {
            (Provider::Local(local), _) | (_, Some(Provider::Local(local))) => local
                .usage()
                .await
                .inspect_err(|e| warn!(error = %e, "local usage report failed"))
                .ok(),
            _ => None,
        };

        StorageStatus {
            active: self.active.kind(),
            fallback: self.fallback_provider(),
            cloud: self.cloud_status.clone(),
            secondary_configured: self.secondary_configured,
            local,
        }
    }

    async fn read_with_fallback<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        key: &str,
        op: F,
    ) -> Result<(T, ProviderKind), StorageError>
    where
        F: Fn(&'a Provider) -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let primary = match op(&self.active).await {
            Ok(value) => return Ok((value, self.active.kind())),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(settle_failure(key, &[(self.active.kind(), primary)]));
        };

        warn!(
            operation,
            key = %key,
            provider = %self.active.kind(),
            fallback = %fallback.kind(),
            error = %primary,
            "active provider failed, trying fallback"
        );

        match op(fallback).await {
            Ok(value) => {
                info!(operation, key = %key, provider = %fallback.kind(), "served by fallback provider");
                Ok((value, fallback.kind()))
            }
            Err(secondary) => Err(settle_failure(
                key,
                &[(self.active.kind(), primary), (fallback.kind(), secondary)],
            )),
        }
    }
}

/// Collapse per-tier failures into the outcome callers act on.
fn settle_failure(key: &str, failures: &[(ProviderKind, StorageError)]) -> StorageError {
    if let Some((_, StorageError::InvalidKey(msg))) = failures
        .iter()
        .find(|(_, e)| matches!(e, StorageError::InvalidKey(_)))
    {
        return StorageError::invalid_key(msg.clone());
    }
    if failures.iter().any(|(_, e)| e.is_not_found()) {
        return StorageError::not_found(key);
    }

    let providers: Vec<&str> = failures.iter().map(|(kind, _)| kind.name()).collect();
    error!(key = %key, providers = ?providers, "no storage backend available");
    StorageError::unavailable(providers.join(", "))
}

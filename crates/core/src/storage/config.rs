//! Storage configuration types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tierstore_shared::{SecondarySettings, StorageSettings};

/// S3-compatible endpoint backing the secondary tier.
#[derive(Clone)]
pub struct SecondaryConfig {
    /// Endpoint URL.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region.
    pub region: String,
}

impl SecondaryConfig {
    /// Create a secondary store config.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }
}

impl fmt::Debug for SecondaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl From<&SecondarySettings> for SecondaryConfig {
    fn from(settings: &SecondarySettings) -> Self {
        Self::new(
            &settings.endpoint,
            &settings.bucket,
            &settings.access_key_id,
            &settings.secret_access_key,
            &settings.region,
        )
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory of the local filesystem tier.
    pub local_root: PathBuf,
    /// `Cache-Control` max-age for downloads, in seconds.
    pub cache_ttl_secs: u64,
    /// Signed URL lifetime, in seconds (default: 3600 = 1 hour).
    pub signed_url_ttl_secs: u64,
    /// Cloud bucket name when not derived from the project ID.
    pub cloud_bucket: Option<String>,
    /// Secondary hosted store, if any.
    pub secondary: Option<SecondaryConfig>,
}

impl StorageConfig {
    /// Default local root.
    pub const DEFAULT_LOCAL_ROOT: &'static str = "./storage";
    /// Default download cache TTL: 1 hour.
    pub const DEFAULT_CACHE_TTL: u64 = 3600;
    /// Default signed URL TTL: 1 hour.
    pub const DEFAULT_SIGNED_URL_TTL: u64 = 3600;

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            cache_ttl_secs: Self::DEFAULT_CACHE_TTL,
            signed_url_ttl_secs: Self::DEFAULT_SIGNED_URL_TTL,
            cloud_bucket: None,
            secondary: None,
        }
    }

    /// Set download cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    /// Set signed URL TTL.
    #[must_use]
    pub fn with_signed_url_ttl(mut self, secs: u64) -> Self {
        self.signed_url_ttl_secs = secs;
        self
    }

    /// Set the cloud bucket.
    #[must_use]
    pub fn with_cloud_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.cloud_bucket = Some(bucket.into());
        self
    }

    /// Enable the secondary tier.
    #[must_use]
    pub fn with_secondary(mut self, secondary: SecondaryConfig) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Signed URL lifetime.
    #[must_use]
    pub const fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOCAL_ROOT)
    }
}

impl From<&StorageSettings> for StorageConfig {
    fn from(settings: &StorageSettings) -> Self {
        let mut config = Self::new(&settings.local_root)
            .with_cache_ttl(settings.cache_ttl_secs)
            .with_signed_url_ttl(settings.signed_url_ttl_secs);
        config.cloud_bucket.clone_from(&settings.cloud_bucket);
        config.secondary = settings.secondary.as_ref().map(SecondaryConfig::from);
        config
    }
}

/// Render a `Cache-Control` header value for the given TTL.
#[must_use]
pub fn cache_control(ttl_secs: u64) -> String {
    format!("public, max-age={ttl_secs}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.local_root, PathBuf::from("./storage"));
        assert_eq!(config.cache_ttl_secs, StorageConfig::DEFAULT_CACHE_TTL);
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(3600));
        assert!(config.cloud_bucket.is_none());
        assert!(config.secondary.is_none());
    }

    #[test]
    fn test_from_settings() {
        let settings = StorageSettings {
            local_root: "/data/objects".to_string(),
            cache_ttl_secs: 120,
            signed_url_ttl_secs: 600,
            cloud_bucket: Some("media".to_string()),
            secondary: Some(SecondarySettings {
                endpoint: "https://storage.example.com".to_string(),
                bucket: "fallback".to_string(),
                access_key_id: "key".to_string(),
                secret_access_key: "secret".to_string(),
                region: "auto".to_string(),
            }),
        };

        let config = StorageConfig::from(&settings);
        assert_eq!(config.local_root, PathBuf::from("/data/objects"));
        assert_eq!(config.cache_ttl_secs, 120);
        assert_eq!(config.signed_url_ttl_secs, 600);
        assert_eq!(config.cloud_bucket.as_deref(), Some("media"));
        assert_eq!(
            config.secondary.as_ref().map(|s| s.bucket.as_str()),
            Some("fallback")
        );
    }

    #[test]
    fn test_secondary_debug_redacts_secret() {
        let secondary = SecondaryConfig::new("https://e", "b", "key", "top-secret", "auto");
        let rendered = format!("{secondary:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_cache_control() {
        assert_eq!(cache_control(3600), "public, max-age=3600");
        assert_eq!(cache_control(0), "public, max-age=0");
    }
}

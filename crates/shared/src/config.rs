//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Object storage configuration.
///
/// Cloud credentials are not part of this struct; they are resolved from the
/// `GCS_*` environment variables and key files at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Root directory of the local filesystem tier.
    #[serde(default = "default_local_root")]
    pub local_root: String,
    /// `Cache-Control` max-age applied to object downloads.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Lifetime of signed URLs handed out by the cloud tier.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
    /// Cloud bucket override. `GCS_BUCKET` takes precedence when set.
    #[serde(default)]
    pub cloud_bucket: Option<String>,
    /// Secondary hosted store. The tier is skipped when absent.
    #[serde(default)]
    pub secondary: Option<SecondarySettings>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            local_root: default_local_root(),
            cache_ttl_secs: default_cache_ttl(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            cloud_bucket: None,
            secondary: None,
        }
    }
}

fn default_local_root() -> String {
    "./storage".to_string()
}

fn default_cache_ttl() -> u64 {
    3600 // 1 hour
}

fn default_signed_url_ttl() -> u64 {
    3600 // 1 hour
}

/// S3-compatible endpoint backing the secondary tier.
#[derive(Debug, Clone, Deserialize)]
pub struct SecondarySettings {
    /// Endpoint URL.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region.
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "auto".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TIERSTORE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        temp_env::with_vars_unset(
            [
                "TIERSTORE__SERVER__PORT",
                "TIERSTORE__STORAGE__LOCAL_ROOT",
                "TIERSTORE__STORAGE__CACHE_TTL_SECS",
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.server.host, "0.0.0.0");
                assert_eq!(config.server.port, 8080);
                assert_eq!(config.storage.local_root, "./storage");
                assert_eq!(config.storage.cache_ttl_secs, 3600);
                assert_eq!(config.storage.signed_url_ttl_secs, 3600);
                assert!(config.storage.secondary.is_none());
            },
        );
    }

    #[test]
    fn test_environment_overrides() {
        temp_env::with_vars(
            [
                ("TIERSTORE__SERVER__PORT", Some("9090")),
                ("TIERSTORE__STORAGE__LOCAL_ROOT", Some("/var/lib/tierstore")),
                ("TIERSTORE__STORAGE__CACHE_TTL_SECS", Some("60")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.storage.local_root, "/var/lib/tierstore");
                assert_eq!(config.storage.cache_ttl_secs, 60);
            },
        );
    }

    #[test]
    fn test_secondary_region_default() {
        let settings: SecondarySettings = config::Config::builder()
            .set_override("endpoint", "https://storage.example.com")
            .expect("endpoint")
            .set_override("bucket", "objects")
            .expect("bucket")
            .set_override("access_key_id", "key")
            .expect("access key")
            .set_override("secret_access_key", "secret")
            .expect("secret key")
            .build()
            .expect("build")
            .try_deserialize()
            .expect("secondary settings should deserialize");

        assert_eq!(settings.bucket, "objects");
        assert_eq!(settings.region, "auto");
    }
}

//! Cloud credential resolution.
//!
//! Sources are tried in a fixed priority order and the first one that parses
//! wins:
//!
//! 1. `GCS_KEY` - inline service-account JSON
//! 2. `GOOGLE_APPLICATION_CREDENTIALS` - path to a JSON key file
//! 3. `GCS_KEY_FILE` - path to a JSON key file
//! 4. `gcs-key.json` in the working directory
//!
//! A source that is unreadable or malformed is logged and skipped. Running out
//! of sources is not an error: it means the cloud tier is unavailable.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::StorageError;

/// Inline service-account JSON.
pub const INLINE_KEY_VAR: &str = "GCS_KEY";
/// Standard cross-tool credentials file path.
pub const APPLICATION_CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Tool-specific key file path.
pub const KEY_FILE_VAR: &str = "GCS_KEY_FILE";
/// Bucket name override.
pub const BUCKET_VAR: &str = "GCS_BUCKET";
/// Key file looked up in the working directory.
pub const DEFAULT_KEY_FILE: &str = "gcs-key.json";

/// Where a set of credentials was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// `GCS_KEY` environment variable.
    InlineEnv,
    /// File named by `GOOGLE_APPLICATION_CREDENTIALS`.
    ApplicationCredentials(PathBuf),
    /// File named by `GCS_KEY_FILE`.
    KeyFile(PathBuf),
    /// `gcs-key.json` in the working directory.
    DefaultFile(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InlineEnv => write!(f, "{INLINE_KEY_VAR}"),
            Self::ApplicationCredentials(path) => {
                write!(f, "{APPLICATION_CREDENTIALS_VAR}={}", path.display())
            }
            Self::KeyFile(path) => write!(f, "{KEY_FILE_VAR}={}", path.display()),
            Self::DefaultFile(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Deserialize)]
struct ServiceAccountFields {
    project_id: String,
    #[serde(default)]
    client_email: Option<String>,
}

/// Parsed service-account credentials.
///
/// The raw JSON is kept in memory for the process lifetime so it can be handed
/// to the backend; it is never written anywhere.
#[derive(Clone)]
pub struct Credentials {
    project_id: String,
    client_email: Option<String>,
    raw: String,
    source: CredentialSource,
}

impl Credentials {
    /// Parse service-account JSON. A `project_id` field is required.
    pub fn from_json(raw: &str, source: CredentialSource) -> Result<Self, StorageError> {
        let fields: ServiceAccountFields = serde_json::from_str(raw)
            .map_err(|e| StorageError::credentials(format!("{source}: {e}")))?;

        if fields.project_id.trim().is_empty() {
            return Err(StorageError::credentials(format!(
                "{source}: project_id is empty"
            )));
        }

        Ok(Self {
            project_id: fields.project_id,
            client_email: fields.client_email,
            raw: raw.to_string(),
            source,
        })
    }

    /// Project identifier.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Service account e-mail, when present.
    #[must_use]
    pub fn client_email(&self) -> Option<&str> {
        self.client_email.as_deref()
    }

    /// Source these credentials were loaded from.
    #[must_use]
    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Bucket used when no override is configured: `<project_id>-storage`.
    #[must_use]
    pub fn default_bucket(&self) -> String {
        format!("{}-storage", self.project_id)
    }

    /// Base64 form of the raw JSON, as the GCS backend expects it.
    #[must_use]
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.raw.as_bytes())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Snapshot of every credential source, in priority order.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// Inline JSON from `GCS_KEY`.
    pub inline_json: Option<String>,
    /// Path from `GOOGLE_APPLICATION_CREDENTIALS`.
    pub application_credentials: Option<PathBuf>,
    /// Path from `GCS_KEY_FILE`.
    pub key_file: Option<PathBuf>,
    /// `gcs-key.json` in the working directory.
    pub default_file: Option<PathBuf>,
    /// Bucket override from `GCS_BUCKET`.
    pub bucket: Option<String>,
}

impl CredentialSources {
    /// Read the sources from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            inline_json: non_empty_var(INLINE_KEY_VAR),
            application_credentials: non_empty_var(APPLICATION_CREDENTIALS_VAR).map(PathBuf::from),
            key_file: non_empty_var(KEY_FILE_VAR).map(PathBuf::from),
            default_file: std::env::current_dir()
                .ok()
                .map(|dir| dir.join(DEFAULT_KEY_FILE)),
            bucket: non_empty_var(BUCKET_VAR),
        }
    }

    /// Resolve credentials from the first source that parses.
    #[must_use]
    pub fn resolve(&self) -> Option<Credentials> {
        for source in self.candidates() {
            match self.load(&source) {
                Ok(Some(credentials)) => {
                    info!(source = %source, project_id = %credentials.project_id(), "cloud credentials resolved");
                    return Some(credentials);
                }
                Ok(None) => debug!(source = %source, "credential source absent"),
                Err(e) => warn!(source = %source, error = %e, "skipping credential source"),
            }
        }

        warn!("no cloud credentials found; cloud storage will not be available");
        None
    }

    fn candidates(&self) -> Vec<CredentialSource> {
        let mut candidates = Vec::with_capacity(4);
        if self.inline_json.is_some() {
            candidates.push(CredentialSource::InlineEnv);
        }
        if let Some(path) = &self.application_credentials {
            candidates.push(CredentialSource::ApplicationCredentials(path.clone()));
        }
        if let Some(path) = &self.key_file {
            candidates.push(CredentialSource::KeyFile(path.clone()));
        }
        if let Some(path) = &self.default_file {
            candidates.push(CredentialSource::DefaultFile(path.clone()));
        }
        candidates
    }

    fn load(&self, source: &CredentialSource) -> Result<Option<Credentials>, StorageError> {
        match source {
            CredentialSource::InlineEnv => self
                .inline_json
                .as_deref()
                .map(|raw| Credentials::from_json(raw, source.clone()))
                .transpose(),
            CredentialSource::ApplicationCredentials(path)
            | CredentialSource::KeyFile(path)
            | CredentialSource::DefaultFile(path) => load_file(path, source),
        }
    }
}

fn load_file(path: &Path, source: &CredentialSource) -> Result<Option<Credentials>, StorageError> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StorageError::credentials(format!("{source}: {e}")))?;
    Credentials::from_json(&raw, source.clone()).map(Some)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

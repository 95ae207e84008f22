//! Storage error types.

use thiserror::Error;
use tierstore_shared::AppError;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object not found in storage.
    #[error("object not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Backend was never initialized, or every configured tier failed.
    #[error("storage backend unavailable: {provider}")]
    Unavailable {
        /// Provider (or providers) that could not serve the request.
        provider: String,
    },

    /// Operation not offered by the backend (e.g. URLs on the secondary tier).
    #[error("operation not supported by storage provider: {0}")]
    Unsupported(String),

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Credential source could not be read or parsed.
    #[error("invalid storage credentials: {0}")]
    Credentials(String),

    /// Backend operation failed mid-flight (network, permissions, I/O).
    #[error("storage operation failed: {0}")]
    Operation(String),

    /// Invalid storage key format.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(provider: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a credentials error.
    #[must_use]
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create an invalid key error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Translate a backend error for `key`, keeping the key in `NotFound`.
    #[must_use]
    pub fn from_backend(err: &opendal::Error, key: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound | opendal::ErrorKind::IsADirectory => {
                Self::not_found(key)
            }
            opendal::ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            _ => Self::Operation(err.to_string()),
        }
    }

    /// Whether this error means the object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error means no backend could serve the request.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            opendal::ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            _ => Self::Operation(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => Self::NotFound(key),
            StorageError::InvalidKey(msg) => Self::Validation(msg),
            StorageError::Unsupported(msg) => Self::NotSupported(msg),
            StorageError::Unavailable { provider } => Self::ServiceUnavailable(provider),
            StorageError::Operation(msg) => Self::ExternalService(msg),
            StorageError::Configuration(msg) | StorageError::Credentials(msg) => {
                Self::Internal(msg)
            }
        }
    }
}

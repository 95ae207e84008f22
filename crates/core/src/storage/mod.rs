//! Tiered object storage using Apache OpenDAL.
//!
//! Three backends sit behind one capability set ([`ObjectStore`]):
//! - Cloud: a Google Cloud Storage bucket
//! - Secondary: an S3-compatible hosted store
//! - Local: a directory tree on disk
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ObjectStorageService                         │
//! │   /objects/<key>  ──►  key  ──►  active tier  ──►  fallback     │
//! ├─────────────────────┬─────────────────────┬─────────────────────┤
//! │   CloudProvider     │  SecondaryProvider  │   LocalProvider     │
//! │   (services::Gcs)   │   (services::S3)    │   (services::Fs)    │
//! └─────────────────────┴─────────────────────┴─────────────────────┘
//! ```
//!
//! The active tier is picked once at startup. Reads retry once on the next
//! tier down; writes, deletes and URL resolution never leave the active tier.

mod cloud;
mod config;
mod credentials;
mod error;
mod local;
mod path;
mod provider;
mod secondary;
mod service;

pub use cloud::{CloudProvider, CloudStatus, UPLOAD_CACHE_CONTROL};
pub use config::{SecondaryConfig, StorageConfig, cache_control};
pub use credentials::{CredentialSource, CredentialSources, Credentials};
pub use error::StorageError;
pub use local::{LOCAL_URL_PREFIX, LocalProvider, LocalUsage, METADATA_SUFFIX};
pub use path::{
    OBJECTS_PREFIX, UPLOADS_NAMESPACE, content_type_for, normalize_object_entity_path,
    object_key, object_path, validate_key,
};
pub use provider::{ObjectMetadata, ObjectStore, Provider, ProviderKind};
pub use secondary::SecondaryProvider;
pub use service::{ObjectDownload, ObjectStorageService, StorageStatus};

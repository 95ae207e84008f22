//! Core storage logic for Tierstore.
//!
//! This crate contains the tiered object storage service with ZERO web
//! dependencies. Backend selection, fallback, path conventions, and the
//! backend adapters all live here.
//!
//! # Modules
//!
//! - `storage` - Credential resolution, backend adapters, and the object storage service

pub mod storage;

//! Object storage collaborator
//!
//! The upload engine only needs two things from a backend: store a blob under
//! a destination path, and derive the durable public URL for a stored path.
//!
//! # Implementations
//!
//! - [`HttpObjectStore`] - PUTs objects to an HTTP object-storage endpoint
//! - [`MemoryStore`] - keeps objects in process (tests, dry runs)

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod http;
pub mod memory;

pub use http::{HttpObjectStore, HttpStoreConfig};
pub use memory::MemoryStore;

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Per-call store options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub overwrite_existing: bool,
}

/// Result of a successful store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path of the object inside its bucket
    pub path: String,
    pub etag: Option<String>,
}

/// Object storage backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob at `name` inside `bucket`
    async fn store(
        &self,
        bucket: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        options: StoreOptions,
    ) -> Result<StoredObject, StoreError>;

    /// Public URL for a stored object. Pure, never fails.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

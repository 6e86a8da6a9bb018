//! Document store — opaque blobs in, handles out.
//!
//! Resumes are stored as uploaded; tailoring reports are stored as JSON. Backends:
//! `S3Store` (S3 / MinIO) and `InMemoryStore` (local runs and tests).

pub mod memory;
pub mod s3;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use s3::S3Store;

/// Opaque identifier of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentHandle(Uuid);

impl DocumentHandle {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Object key under which the blob lives in a keyed backend.
    pub fn object_key(&self) -> String {
        format!("documents/{}", self.0)
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentHandle {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| StoreError::InvalidHandle(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document {0} not found")]
    NotFound(DocumentHandle),

    #[error("Invalid document handle: {0}")]
    InvalidHandle(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Key/blob store contract. Carried in `AppState` as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, blob: Bytes, content_type: &str) -> Result<DocumentHandle, StoreError>;

    async fn get(&self, handle: &DocumentHandle) -> Result<Bytes, StoreError>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

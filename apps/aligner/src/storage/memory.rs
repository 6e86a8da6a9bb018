use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::storage::{DocumentHandle, DocumentStore, StoreError};

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blobs: RwLock<HashMap<DocumentHandle, Bytes>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn put(&self, blob: Bytes, content_type: &str) -> Result<DocumentHandle, StoreError> {
        let handle = DocumentHandle::generate();
        debug!("Storing {} bytes ({content_type}) as {handle}", blob.len());
        self.blobs.write().await.insert(handle.clone(), blob);
        Ok(handle)
    }

    async fn get(&self, handle: &DocumentHandle) -> Result<Bytes, StoreError> {
        self.blobs
            .read()
            .await
            .get(handle)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(handle.clone()))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStore::new();
        let handle = store
            .put(Bytes::from_static(b"resume"), "text/plain")
            .await
            .unwrap();
        assert_eq!(store.get(&handle).await.unwrap(), Bytes::from_static(b"resume"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_each_put_gets_a_fresh_handle() {
        let store = InMemoryStore::new();
        let a = store.put(Bytes::from_static(b"x"), "text/plain").await.unwrap();
        let b = store.put(Bytes::from_static(b"x"), "text/plain").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get(&DocumentHandle::generate()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}

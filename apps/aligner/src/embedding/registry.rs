//! Process-wide embedding model handle.
//!
//! Loaded lazily on first use, read-only afterwards, released on shutdown. Requests clone
//! the `Arc`, so a teardown never invalidates an alignment already in flight.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::embedding::{Embedder, EmbeddingError};

static MODEL: RwLock<Option<Arc<dyn Embedder>>> = RwLock::new(None);

/// Returns the installed embedder, installing the one built by `load` if none is.
/// `load` runs at most once per installation.
pub fn get_or_init<F>(load: F) -> Result<Arc<dyn Embedder>, EmbeddingError>
where
    F: FnOnce() -> Arc<dyn Embedder>,
{
    if let Ok(existing) = handle() {
        return Ok(existing);
    }
    let mut slot = MODEL.write().map_err(|_| poisoned())?;
    // Another thread may have won the race between the read and write locks.
    let embedder = slot.get_or_insert_with(|| {
        let embedder = load();
        info!("Embedding model initialized (dimension: {})", embedder.dimension());
        embedder
    });
    Ok(Arc::clone(&*embedder))
}

pub fn handle() -> Result<Arc<dyn Embedder>, EmbeddingError> {
    MODEL
        .read()
        .map_err(|_| poisoned())?
        .clone()
        .ok_or(EmbeddingError::NotInitialized)
}

/// Drops the process-wide handle. Returns whether one was installed.
pub fn teardown() -> bool {
    let released = match MODEL.write() {
        Ok(mut slot) => slot.take().is_some(),
        Err(poisoned) => poisoned.into_inner().take().is_some(),
    };
    if released {
        info!("Embedding model released");
    }
    released
}

fn poisoned() -> EmbeddingError {
    EmbeddingError::Failed("embedding registry lock poisoned".to_string())
}

use std::sync::Arc;

use crate::llm_client::TextGenerator;
use crate::storage::DocumentStore;
use crate::tailoring::pipeline::{RetryPolicy, TailoringEngine};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read-only alignment engine; the embedding model inside it is the process-wide handle.
    pub engine: Arc<TailoringEngine>,
    /// Pluggable document store. S3 when configured, in-memory otherwise.
    pub store: Arc<dyn DocumentStore>,
    /// Generative-text collaborator. `None` leaves suggestions pending.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub retry: RetryPolicy,
}

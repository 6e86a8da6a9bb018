use thiserror::Error;
use uuid::Uuid;

/// Failures of the alignment engine.
///
/// `UnsupportedFormat`, `CorruptDocument` and `EmptyDocument` describe the input itself and
/// are never worth retrying. `IncompleteResponse` is an integration error in the caller.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Document contains no text")]
    EmptyDocument,

    #[error("No response for {} suggestion request(s): {}", .unresolved.len(), join_ids(.unresolved))]
    IncompleteResponse { unresolved: Vec<Uuid> },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingError),
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

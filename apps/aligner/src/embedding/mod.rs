//! Embedding — pluggable text → vector collaborator used by the semantic matcher.
//!
//! Default: `HashingEmbedder` (feature-hashed bag of words, deterministic, no model files).
//! The matcher only sees `Arc<dyn Embedder>`, so a model-backed embedder can be swapped
//! in at startup without touching alignment code.

pub mod hashing;
pub mod registry;

use thiserror::Error;

pub use hashing::HashingEmbedder;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding model is not initialized")]
    NotInitialized,

    #[error("Embedding failed: {0}")]
    Failed(String),
}

/// Text embedder contract: same text in, same vector out, always `dimension()` long.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity clamped to [0, 1]. A zero vector is similar to nothing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

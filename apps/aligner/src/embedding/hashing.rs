//! Feature-hashing embedder.
//!
//! Tokens are lowercased, stopwords dropped and plurals crudely stemmed, then each
//! token is hashed (FNV-1a) into one of `dimension` buckets. The count vector is
//! L2-normalized. Texts sharing vocabulary score high; unrelated texts score near 0.

use crate::embedding::{Embedder, EmbeddingError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "of", "on", "or", "our", "the", "to", "we", "with", "you", "your",
];

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Failed(
                "embedding dimension must be positive".to_string(),
            ));
        }

        let mut vector = vec![0.0_f32; self.dimension];
        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

/// Lowercased content tokens. `+`, `#`, `.` and `/` survive inside a token so
/// "c++", "c#", "node.js" and "ci/cd" stay distinct features.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.' | '/')))
        .map(|t| t.trim_matches(|c: char| matches!(c, '.' | '/')))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .map(stem)
}

fn stem(token: String) -> String {
    let plural = token.len() > 3 && token.ends_with('s') && !token.ends_with("ss");
    if plural && token.chars().all(char::is_alphabetic) {
        token[..token.len() - 1].to_string()
    } else {
        token
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    fn similarity(a: &str, b: &str) -> f32 {
        let embedder = HashingEmbedder::new(512);
        cosine_similarity(&embedder.embed(a).unwrap(), &embedder.embed(b).unwrap())
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Built billing APIs in Rust").unwrap();
        let b = embedder.embed("Built billing APIs in Rust").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_plural_insensitive() {
        assert!((similarity("Python", "python") - 1.0).abs() < 1e-6);
        assert!((similarity("microservices", "Microservice") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let related = similarity("Kubernetes", "Deployed services on Kubernetes");
        let unrelated = similarity("Kubernetes", "Wrote marketing copy");
        assert!(related > unrelated);
        assert!(related > 0.5);
    }

    #[test]
    fn test_tech_tokens_are_kept_whole() {
        let collected: Vec<String> = tokens("C++, Node.js and CI/CD.").collect();
        assert_eq!(collected, vec!["c++", "node.js", "ci/cd"]);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert_eq!(embedder.embed("  the and ").unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn test_zero_dimension_fails() {
        assert!(HashingEmbedder::new(0).embed("rust").is_err());
    }
}

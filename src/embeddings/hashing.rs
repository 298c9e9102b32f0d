//! Offline embedder: signed feature hashing of word tokens.
//!
//! Deterministic across runs and machines, which makes experiments
//! reproducible without an API key. Texts sharing vocabulary land close
//! together; synonyms do not.

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use super::Embedder;
use crate::error::Result;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"[a-z0-9]+").unwrap())
}

/// Feature-hashing embedder over lowercase alphanumeric tokens.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model: format!("hashing-{}", dimensions),
        }
    }

    /// L2-normalised vector; all zeros for text without tokens.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        for token in token_regex().find_iter(&lower) {
            let digest = Sha256::digest(token.as_str().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_text("SQL injection attacks exploit input validation");
        let b = embedder.embed_text("SQL injection attacks exploit input validation");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(
            embedder.embed_text("Phishing, attacks!"),
            embedder.embed_text("phishing attacks")
        );
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed_text("how does ransomware encrypt files");
        let related = embedder.embed_text("ransomware encrypts files and demands payment");
        let unrelated = embedder.embed_text("cross site scripting injects browser scripts");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed_text("  ?! ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_model_name_carries_dimensions() {
        assert_eq!(HashingEmbedder::new(384).model(), "hashing-384");
        assert_eq!(HashingEmbedder::new(0).dimensions(), 1);
    }
}

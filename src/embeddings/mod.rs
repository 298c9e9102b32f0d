pub mod cache;
pub mod hashing;
pub mod openai;
pub mod storage;

pub use cache::EmbeddingCache;
pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;
pub use storage::EmbeddingStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{require_api_key, EmbeddingProvider, EmbeddingsConfig};
use crate::error::Result;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(vec![text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            crate::error::KgragError::Embedding("Empty embedding response".to_string())
        })
    }

    fn dimensions(&self) -> usize;

    /// Identifier used to key persisted vectors.
    fn model(&self) -> &str;
}

/// Construct the configured embedder. Networked providers fail here if their
/// API key is missing.
pub fn build_embedder(config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions()))),
        EmbeddingProvider::OpenAI => {
            let api_key = require_api_key(&config.api_key_env)?;
            let cache = (config.cache_capacity > 0)
                .then(|| Arc::new(EmbeddingCache::new(config.cache_capacity)));
            Ok(Arc::new(OpenAIEmbedder::new_with_cache(
                api_key,
                config.model.clone(),
                config.batch_size,
                config.dimensions,
                cache,
            )?))
        }
    }
}

/// Cosine similarity of two vectors. 0.0 for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

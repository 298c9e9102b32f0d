use super::{EmbeddingCache, Embedder};
use crate::error::{KgragError, Result};
use crate::retry::with_backoff;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const MAX_BATCH_SIZE: usize = 2048;
const DEFAULT_DIMENSIONS: usize = 1536;
const MAX_RETRIES: usize = 3;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embeddings client
///
/// Handles batch embedding generation with retry logic and rate limiting.
/// Single-text requests (queries, ground truths) go through the optional cache.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    batch_size: usize,
    dimensions: Option<usize>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder without a cache
    ///
    /// * `batch_size` - Maximum number of texts to send per API request (max 2048)
    pub fn new(api_key: String, model: String, batch_size: usize) -> Result<Self> {
        Self::new_with_cache(api_key, model, batch_size, None, None)
    }

    /// Create a new OpenAI embedder
    ///
    /// * `dimensions` - Requested output size (text-embedding-3 models only);
    ///   None keeps the model default
    /// * `cache` - Optional embedding cache for single-text requests
    pub fn new_with_cache(
        api_key: String,
        model: String,
        batch_size: usize,
        dimensions: Option<usize>,
        cache: Option<Arc<EmbeddingCache>>,
    ) -> Result<Self> {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| KgragError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            batch_size,
            dimensions,
            cache,
        })
    }

    /// Make a single API request
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| KgragError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(KgragError::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KgragError::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(KgragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        with_backoff("Embedding API call", MAX_RETRIES, Duration::from_secs(1), move || {
            self.request(texts)
        })
        .await
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    /// Embed texts, splitting into API-sized batches
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.request_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);

            // Rate limiting: small delay between full batches
            if chunk.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    /// Embed a single text, checking the cache first
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Cache hit for text: {}", text);
                return Ok(cached);
            }
        }

        let embedding = self
            .request_with_retry(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| KgragError::Embedding("Empty response from OpenAI API".to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or(DEFAULT_DIMENSIONS)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(batch_size: usize) -> OpenAIEmbedder {
        OpenAIEmbedder::new(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            batch_size,
        )
        .unwrap()
    }

    #[test]
    fn test_embedder_new() {
        let embedder = embedder(100);
        assert_eq!(embedder.model(), "text-embedding-3-small");
        assert_eq!(embedder.batch_size, 100);
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_embedder_batch_size_limit() {
        assert_eq!(embedder(5000).batch_size, 2048);
        assert_eq!(embedder(2048).batch_size, 2048);
        assert_eq!(embedder(0).batch_size, 1);
    }

    #[test]
    fn test_request_serialization_omits_default_dimensions() {
        let input = vec!["a".to_string()];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "m",
            input: &input,
            dimensions: None,
        })
        .unwrap();
        assert!(body.get("dimensions").is_none());

        let body = serde_json::to_value(EmbeddingRequest {
            model: "m",
            input: &input,
            dimensions: Some(256),
        })
        .unwrap();
        assert_eq!(body["dimensions"], 256);
    }

    #[tokio::test]
    async fn test_cached_text_skips_network() {
        let cache = Arc::new(EmbeddingCache::new(4));
        cache.put("what is phishing".to_string(), vec![0.5, 0.5]);
        let embedder = OpenAIEmbedder::new_with_cache(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            10,
            None,
            Some(cache),
        )
        .unwrap();
        assert_eq!(embedder.embed("what is phishing").await.unwrap(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        assert!(embedder(10).embed_batch(Vec::new()).await.unwrap().is_empty());
    }
}

//! Nearest-neighbour passage retrieval over an embedded corpus.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::corpus::Document;
use crate::embeddings::{cosine_similarity, Embedder, EmbeddingStore};
use crate::error::{KgragError, Result};

/// A retrieved passage. `rank` is 1-based; `score` is in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub rank: usize,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Top `k` passages for `query`, highest relevance first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>>;

    /// Number of indexed passages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force cosine retriever. The corpus is embedded once at
/// construction; queries embed only the query text.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
}

impl VectorRetriever {
    /// Embed every document, reusing `store` vectors when one is given.
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        documents: Vec<Document>,
        store: Option<&EmbeddingStore>,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(KgragError::InvalidInput("corpus is empty".to_string()));
        }

        let start = Instant::now();
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = match store {
            Some(store) => store.embed_missing(embedder.as_ref(), &texts).await?,
            None => embedder.embed_batch(texts).await?,
        };

        if vectors.len() != documents.len() {
            return Err(KgragError::Embedding(format!(
                "Expected {} document embeddings, got {}",
                documents.len(),
                vectors.len()
            )));
        }

        log::info!(
            "Indexed {} documents with {} in {:?}",
            documents.len(),
            embedder.model(),
            start.elapsed()
        );

        Ok(Self {
            embedder,
            documents,
            vectors,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        if query.trim().is_empty() {
            return Err(KgragError::InvalidInput("Query cannot be empty".to_string()));
        }

        let start = Instant::now();
        let query_vector = self.embedder.embed(query).await?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query_vector, v).clamp(0.0, 1.0)))
            .collect();
        // stable sort keeps corpus order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let passages: Vec<Passage> = scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (i, score))| Passage {
                id: self.documents[i].id.clone(),
                text: self.documents[i].text.clone(),
                score,
                rank: rank + 1,
            })
            .collect();

        log::debug!(
            "Retrieved {} passages in {:?}",
            passages.len(),
            start.elapsed()
        );
        Ok(passages)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

//! The two RAG pipelines and the explicit context they share.

mod pipeline;

pub use crate::context::RagMethod;
pub use pipeline::{RagPipeline, RagResponse};

use std::sync::Arc;

use crate::config::Config;
use crate::context::{ContextExpander, FusionRanker, ScorePolicy};
use crate::corpus::Document;
use crate::embeddings::{build_embedder, Embedder, EmbeddingStore};
use crate::error::Result;
use crate::generation::{build_generator, Generator};
use crate::graph::{GraphSpec, GraphStore};
use crate::retrieval::{Retriever, VectorRetriever};

/// Everything a pipeline needs, built once per process and borrowed by
/// every query.
pub struct AppContext {
    pub config: Config,
    pub graph: Arc<GraphStore>,
    pub embedder: Arc<dyn Embedder>,
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub expander: ContextExpander,
    pub ranker: FusionRanker,
}

impl AppContext {
    /// Build the graph, index `documents` and construct the configured
    /// providers. Any failure here aborts startup.
    pub async fn build(config: Config, documents: Vec<Document>) -> Result<Self> {
        let graph = Arc::new(load_graph(&config)?);
        let embedder = build_embedder(&config.embeddings)?;

        let store = match &config.embeddings.store_path {
            Some(path) => Some(EmbeddingStore::open(path).await?),
            None => None,
        };
        let retriever: Arc<dyn Retriever> = Arc::new(
            VectorRetriever::build(embedder.clone(), documents, store.as_ref()).await?,
        );
        let generator = build_generator(&config.generation)?;

        Ok(Self::new(config, graph, embedder, retriever, generator))
    }

    /// Assemble a context from already-built collaborators.
    pub fn new(
        config: Config,
        graph: Arc<GraphStore>,
        embedder: Arc<dyn Embedder>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let expander = ContextExpander::new(graph.clone(), &config.graph);
        let ranker = FusionRanker::new(ScorePolicy::from(&config.fusion));
        Self {
            config,
            graph,
            embedder,
            retriever,
            generator,
            expander,
            ranker,
        }
    }

    pub fn pipeline(&self, method: RagMethod) -> RagPipeline<'_> {
        RagPipeline::new(self, method)
    }
}

/// The configured graph specification, or the built-in CSKG.
pub fn load_graph(config: &Config) -> Result<GraphStore> {
    let spec = match &config.graph.spec_path {
        Some(path) => GraphSpec::from_path(path)?,
        None => GraphSpec::cskg(),
    };
    spec.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::sample;

    #[tokio::test]
    async fn test_build_offline_context() {
        let ctx = AppContext::build(Config::default(), sample::documents())
            .await
            .unwrap();
        assert_eq!(ctx.graph.node_count(), 24);
        assert_eq!(ctx.retriever.len(), 15);
        assert_eq!(ctx.generator.describe(), "template");
    }

    #[tokio::test]
    async fn test_build_rejects_empty_corpus() {
        assert!(AppContext::build(Config::default(), Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_build_with_embedding_store() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.embeddings.store_path = Some(temp_dir.path().join("emb.db"));
        let ctx = AppContext::build(config, sample::documents()).await.unwrap();
        let store = EmbeddingStore::open(temp_dir.path().join("emb.db")).await.unwrap();
        assert_eq!(store.count(ctx.embedder.model()).await.unwrap(), 15);
    }
}

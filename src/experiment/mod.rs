//! Run both RAG methods over the evaluation queries and compare them.

pub mod report;

pub use report::{render_markdown, save, SavedReport};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::context::RagMethod;
use crate::corpus::{self, sample, EvalQuery};
use crate::error::Result;
use crate::eval::{self, AggregateMetrics, Comparison, ResponseMetrics};
use crate::graph::GraphStats;
use crate::rag::AppContext;

/// One query's outcome under one method.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    #[serde(flatten)]
    pub metrics: ResponseMetrics,
    pub answer: String,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodRun {
    pub method: RagMethod,
    pub aggregate: AggregateMetrics,
    pub queries: Vec<QueryResult>,
}

/// Everything one experiment produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResults {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub embedding_model: String,
    pub generator: String,
    pub num_documents: usize,
    pub graph: GraphStats,
    pub runs: Vec<MethodRun>,
    pub comparison: Comparison,
}

impl ExperimentResults {
    pub fn run(&self, method: RagMethod) -> Option<&MethodRun> {
        self.runs.iter().find(|r| r.method == method)
    }
}

pub struct ExperimentRunner {
    ctx: AppContext,
    queries: Vec<EvalQuery>,
}

impl ExperimentRunner {
    pub fn new(ctx: AppContext, queries: Vec<EvalQuery>) -> Self {
        Self { ctx, queries }
    }

    /// Load the configured corpus and queries (built-in sample when unset)
    /// and build the shared context.
    pub async fn from_config(config: Config) -> Result<Self> {
        let documents = match &config.experiment.corpus {
            Some(path) => corpus::load_documents(path)?,
            None => sample::documents(),
        };
        let queries = match &config.experiment.queries {
            Some(path) => corpus::load_queries(path)?,
            None => sample::queries(),
        };

        let ctx = AppContext::build(config, documents).await?;
        Ok(Self::new(ctx, queries))
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn queries(&self) -> &[EvalQuery] {
        &self.queries
    }

    /// Answer and evaluate every query with one method.
    pub async fn run_method(&self, method: RagMethod) -> Result<MethodRun> {
        log::info!("Running {} over {} queries", method.label(), self.queries.len());
        let pipeline = self.ctx.pipeline(method);
        let mut queries = Vec::with_capacity(self.queries.len());

        for (i, eval_query) in self.queries.iter().enumerate() {
            let response = pipeline.answer(&eval_query.query).await?;
            let metrics =
                eval::evaluate_response(self.ctx.embedder.as_ref(), &response, &eval_query.ground_truth)
                    .await?;

            log::info!(
                "[{}/{}] {} ({:.2}s, {} passages, {} entities)",
                i + 1,
                self.queries.len(),
                eval_query.query,
                metrics.response_time,
                metrics.num_retrieved,
                metrics.entities_used
            );

            queries.push(QueryResult {
                entities: response.bundle.entities().to_vec(),
                answer: response.answer,
                metrics,
            });
        }

        let metrics: Vec<ResponseMetrics> = queries.iter().map(|q| q.metrics.clone()).collect();
        Ok(MethodRun {
            method,
            aggregate: eval::aggregate(&metrics),
            queries,
        })
    }

    /// Run every method in order and compare the aggregates.
    pub async fn run(&self) -> Result<ExperimentResults> {
        let start = Instant::now();
        let timestamp = Utc::now();

        let mut runs = Vec::with_capacity(RagMethod::ALL.len());
        for method in RagMethod::ALL {
            runs.push(self.run_method(method).await?);
        }

        let aggregates: Vec<(RagMethod, &AggregateMetrics)> =
            runs.iter().map(|r| (r.method, &r.aggregate)).collect();
        let comparison = eval::compare(&aggregates);

        log::info!("Experiment finished in {:.2}s", start.elapsed().as_secs_f64());

        Ok(ExperimentResults {
            run_id: Uuid::new_v4(),
            timestamp,
            embedding_model: self.ctx.embedder.model().to_string(),
            generator: self.ctx.generator.describe(),
            num_documents: self.ctx.retriever.len(),
            graph: self.ctx.graph.stats(),
            runs,
            comparison,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_experiment_over_sample() {
        let runner = ExperimentRunner::from_config(Config::default()).await.unwrap();
        assert_eq!(runner.queries().len(), 10);

        let results = runner.run().await.unwrap();
        assert_eq!(results.num_documents, 15);
        assert_eq!(results.generator, "template");
        assert_eq!(results.runs.len(), 2);

        let traditional = results.run(RagMethod::Traditional).unwrap();
        let graph = results.run(RagMethod::GraphAugmented).unwrap();
        assert_eq!(traditional.aggregate.num_queries, 10);
        assert_eq!(graph.aggregate.num_queries, 10);
        assert_eq!(traditional.aggregate.avg_entities_used, 0.0);
        assert!(graph.aggregate.avg_entities_used > 0.0);
        assert_eq!(graph.aggregate.generation_failures, 0);

        // same passages per query, so the graph bonus can only raise the score
        for (t, g) in traditional.queries.iter().zip(&graph.queries) {
            assert_eq!(t.metrics.query, g.metrics.query);
            assert!(g.metrics.fused_score >= t.metrics.fused_score);
        }
        assert_eq!(results.comparison.retrieval_score, Some(RagMethod::GraphAugmented));
    }

    #[tokio::test]
    async fn test_custom_queries_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let queries_path = temp_dir.path().join("queries.json");
        std::fs::write(
            &queries_path,
            r#"[{"query": "How does ransomware spread?", "ground_truth": "Through unpatched systems."}]"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.experiment.queries = Some(queries_path);
        let runner = ExperimentRunner::from_config(config).await.unwrap();
        let run = runner.run_method(RagMethod::GraphAugmented).await.unwrap();

        assert_eq!(run.queries.len(), 1);
        assert!(run.queries[0].entities.iter().any(|e| e == "Ransomware"));
        assert!(run.queries[0].metrics.semantic_similarity.is_some());
    }
}

//! Per-response metrics, batch aggregation and method comparison.

use serde::Serialize;

use crate::context::RagMethod;
use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::Result;
use crate::rag::RagResponse;

/// Metrics of one answered query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetrics {
    pub query: String,
    pub method: RagMethod,
    /// Cosine similarity of answer and ground truth embeddings; None without
    /// a ground truth.
    pub semantic_similarity: Option<f32>,
    pub num_retrieved: usize,
    pub avg_retrieval_score: f32,
    pub top_retrieval_score: f32,
    /// Fused retrieval-quality score of the bundle
    pub fused_score: f32,
    pub response_length: usize,
    pub entities_used: usize,
    pub response_time: f64,
    pub generation_failed: bool,
}

/// Number of whitespace-separated words.
pub fn response_length(text: &str) -> usize {
    text.split_whitespace().count()
}

pub async fn semantic_similarity(embedder: &dyn Embedder, a: &str, b: &str) -> Result<f32> {
    let a = embedder.embed(a).await?;
    let b = embedder.embed(b).await?;
    Ok(cosine_similarity(&a, &b))
}

/// Score one response against its ground truth.
pub async fn evaluate_response(
    embedder: &dyn Embedder,
    response: &RagResponse,
    ground_truth: &str,
) -> Result<ResponseMetrics> {
    let semantic_similarity = if ground_truth.trim().is_empty() {
        None
    } else {
        Some(semantic_similarity(embedder, &response.answer, ground_truth).await?)
    };

    let bundle = &response.bundle;
    Ok(ResponseMetrics {
        query: response.query.clone(),
        method: response.method,
        semantic_similarity,
        num_retrieved: bundle.passages.len(),
        avg_retrieval_score: bundle.avg_passage_score(),
        top_retrieval_score: bundle.top_passage_score(),
        fused_score: bundle.retrieval_score,
        response_length: response_length(&response.answer),
        entities_used: bundle.entities_used(),
        response_time: response.elapsed.as_secs_f64(),
        generation_failed: response.generation_failed,
    })
}

/// Means over a batch of responses for one method.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub num_queries: usize,
    pub avg_semantic_similarity: f32,
    pub avg_num_retrieved: f32,
    pub avg_retrieval_score: f32,
    pub avg_top_retrieval_score: f32,
    pub avg_fused_score: f32,
    pub avg_response_length: f32,
    pub avg_entities_used: f32,
    pub avg_response_time: f64,
    pub total_time: f64,
    pub generation_failures: usize,
}

fn mean<I: Iterator<Item = f32>>(values: I, n: usize) -> f32 {
    if n == 0 {
        0.0
    } else {
        values.sum::<f32>() / n as f32
    }
}

/// Aggregate a batch. Missing semantic similarities count as 0.
pub fn aggregate(metrics: &[ResponseMetrics]) -> AggregateMetrics {
    let n = metrics.len();
    if n == 0 {
        return AggregateMetrics::default();
    }
    let total_time: f64 = metrics.iter().map(|m| m.response_time).sum();

    AggregateMetrics {
        num_queries: n,
        avg_semantic_similarity: mean(
            metrics.iter().map(|m| m.semantic_similarity.unwrap_or(0.0)),
            n,
        ),
        avg_num_retrieved: mean(metrics.iter().map(|m| m.num_retrieved as f32), n),
        avg_retrieval_score: mean(metrics.iter().map(|m| m.avg_retrieval_score), n),
        avg_top_retrieval_score: mean(metrics.iter().map(|m| m.top_retrieval_score), n),
        avg_fused_score: mean(metrics.iter().map(|m| m.fused_score), n),
        avg_response_length: mean(metrics.iter().map(|m| m.response_length as f32), n),
        avg_entities_used: mean(metrics.iter().map(|m| m.entities_used as f32), n),
        avg_response_time: total_time / n as f64,
        total_time,
        generation_failures: metrics.iter().filter(|m| m.generation_failed).count(),
    }
}

/// Best method per headline metric. Ties go to the first method listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comparison {
    /// Highest average semantic similarity; None if every value is 0
    pub semantic_similarity: Option<RagMethod>,
    /// Lowest average response time; None without timed queries
    pub response_time: Option<RagMethod>,
    /// Highest average fused retrieval score; None if every value is 0
    pub retrieval_score: Option<RagMethod>,
}

/// Best `(method, value)` among `results`, first listed on ties.
fn best_by(
    results: &[(RagMethod, &AggregateMetrics)],
    value: impl Fn(&AggregateMetrics) -> f64,
    higher: bool,
) -> Option<(RagMethod, f64)> {
    let mut best: Option<(RagMethod, f64)> = None;
    for &(method, agg) in results.iter().filter(|(_, a)| a.num_queries > 0) {
        let v = value(agg);
        let better = match best {
            None => true,
            Some((_, b)) if higher => v > b,
            Some((_, b)) => v < b,
        };
        if better {
            best = Some((method, v));
        }
    }
    best
}

pub fn compare(results: &[(RagMethod, &AggregateMetrics)]) -> Comparison {
    let positive = |best: Option<(RagMethod, f64)>| {
        best.filter(|(_, v)| *v > 0.0).map(|(m, _)| m)
    };

    Comparison {
        semantic_similarity: positive(best_by(
            results,
            |a| a.avg_semantic_similarity as f64,
            true,
        )),
        response_time: best_by(results, |a| a.avg_response_time, false).map(|(m, _)| m),
        retrieval_score: positive(best_by(results, |a| a.avg_fused_score as f64, true)),
    }
}

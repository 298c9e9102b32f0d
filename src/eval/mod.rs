//! Evaluation: per-response metrics, batch aggregation, method comparison.

pub mod metrics;

pub use metrics::{
    aggregate, compare, evaluate_response, response_length, semantic_similarity,
    AggregateMetrics, Comparison, ResponseMetrics,
};

//! Per-query context assembly: graph expansion of matched entities and the
//! fusion of that graph context with retrieved passages.

mod expander;
mod fusion;

pub use expander::{
    ContextExpander, EntityExpansion, GraphContext, MitigationRoute, MitigationStatus, Omission,
    OmissionReason,
};
pub use fusion::{ContextBundle, FusionRanker, ScorePolicy};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two answer-generation strategies under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagMethod {
    /// Vector retrieval only
    Traditional,
    /// Vector retrieval fused with knowledge-graph context
    GraphAugmented,
}

impl RagMethod {
    pub const ALL: [RagMethod; 2] = [RagMethod::Traditional, RagMethod::GraphAugmented];

    pub fn as_str(&self) -> &'static str {
        match self {
            RagMethod::Traditional => "traditional",
            RagMethod::GraphAugmented => "graph_augmented",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RagMethod::Traditional => "Traditional RAG",
            RagMethod::GraphAugmented => "Graph-Augmented RAG",
        }
    }
}

impl fmt::Display for RagMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

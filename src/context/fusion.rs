//! Merges retrieved passages with graph context and scores the result.

use serde::Serialize;

use super::{GraphContext, RagMethod};
use crate::config::{FusionConfig, ScoreAggregation};
use crate::retrieval::Passage;

/// Retrieval-quality scoring policy.
///
/// `fused = base + (1 - base) * graph_weight * min(n, saturation) / saturation`
/// where `base` is the aggregated passage score and `n` the number of
/// expanded entities. The result stays in [0, 1] and never decreases when
/// either `base` or `n` grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorePolicy {
    pub aggregation: ScoreAggregation,
    pub graph_weight: f32,
    pub entity_saturation: usize,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self::from(&FusionConfig::default())
    }
}

impl From<&FusionConfig> for ScorePolicy {
    fn from(config: &FusionConfig) -> Self {
        Self {
            aggregation: config.aggregation,
            graph_weight: config.graph_weight.clamp(0.0, 1.0),
            entity_saturation: config.entity_saturation.max(1),
        }
    }
}

impl ScorePolicy {
    /// Aggregated retriever score in [0, 1]; 0 without passages.
    pub fn base(&self, passages: &[Passage]) -> f32 {
        if passages.is_empty() {
            return 0.0;
        }
        let base = match self.aggregation {
            ScoreAggregation::Mean => {
                passages.iter().map(|p| p.score).sum::<f32>() / passages.len() as f32
            }
            ScoreAggregation::Top1 => passages
                .iter()
                .map(|p| p.score)
                .fold(f32::NEG_INFINITY, f32::max),
        };
        if base.is_nan() {
            0.0
        } else {
            base.clamp(0.0, 1.0)
        }
    }

    pub fn score(&self, passages: &[Passage], expanded_entities: usize) -> f32 {
        let base = self.base(passages);
        let saturation = self.entity_saturation.max(1);
        let grounding = expanded_entities.min(saturation) as f32 / saturation as f32;
        (base + (1.0 - base) * self.graph_weight * grounding).clamp(0.0, 1.0)
    }
}

/// The unit handed to generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBundle {
    pub query: String,
    pub method: RagMethod,
    /// Exactly as ranked by the retriever.
    pub passages: Vec<Passage>,
    /// None for the traditional pipeline.
    pub graph: Option<GraphContext>,
    pub retrieval_score: f32,
}

impl ContextBundle {
    /// Selected entities in first-seen order.
    pub fn entities(&self) -> &[String] {
        self.graph
            .as_ref()
            .map(|g| g.entities.as_slice())
            .unwrap_or(&[])
    }

    /// Entities with a successful expansion.
    pub fn entities_used(&self) -> usize {
        self.graph.as_ref().map_or(0, GraphContext::expanded_count)
    }

    pub fn avg_passage_score(&self) -> f32 {
        if self.passages.is_empty() {
            return 0.0;
        }
        self.passages.iter().map(|p| p.score).sum::<f32>() / self.passages.len() as f32
    }

    pub fn top_passage_score(&self) -> f32 {
        self.passages.first().map_or(0.0, |p| p.score)
    }
}

/// Stateless merge of passages and graph context.
#[derive(Debug, Clone, Default)]
pub struct FusionRanker {
    policy: ScorePolicy,
}

impl FusionRanker {
    pub fn new(policy: ScorePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScorePolicy {
        &self.policy
    }

    /// Build the bundle. Passages keep the retriever's order; graph context
    /// keeps the expander's first-seen order.
    pub fn fuse(
        &self,
        query: &str,
        method: RagMethod,
        passages: Vec<Passage>,
        graph: Option<GraphContext>,
    ) -> ContextBundle {
        let expanded = graph.as_ref().map_or(0, GraphContext::expanded_count);
        let retrieval_score = self.policy.score(&passages, expanded);
        log::debug!(
            "Fused {} passages with {} entities: score {:.3}",
            passages.len(),
            expanded,
            retrieval_score
        );
        ContextBundle {
            query: query.to_string(),
            method,
            passages,
            graph,
            retrieval_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextExpander;
    use crate::graph::GraphSpec;
    use std::sync::Arc;

    fn passages(scores: &[f32]) -> Vec<Passage> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| Passage {
                id: format!("doc_{}", i),
                text: format!("passage {}", i),
                score,
                rank: i + 1,
            })
            .collect()
    }

    fn cskg_context(entities: &[&str]) -> GraphContext {
        let graph = Arc::new(GraphSpec::cskg().build().unwrap());
        ContextExpander::with_limits(graph, 5, 1, 3)
            .expand_entities(entities.iter().map(|e| e.to_string()).collect())
    }

    #[test]
    fn test_more_entities_raise_score() {
        let ranker = FusionRanker::default();
        let with_graph = ranker.fuse(
            "q",
            RagMethod::GraphAugmented,
            passages(&[0.8, 0.6]),
            Some(cskg_context(&["Phishing", "Malware", "Firewall"])),
        );
        let without = ranker.fuse("q", RagMethod::GraphAugmented, passages(&[0.8, 0.6]), None);
        assert_eq!(with_graph.entities_used(), 3);
        assert!(with_graph.retrieval_score > without.retrieval_score);
        assert!((without.retrieval_score - 0.7).abs() < 1e-6);
        // 0.7 + 0.3 * 0.3 * 3/5
        assert!((with_graph.retrieval_score - 0.754).abs() < 1e-5);
    }

    #[test]
    fn test_score_monotonic_and_bounded() {
        let policy = ScorePolicy::default();
        for base_scores in [[0.0, 0.0], [0.3, 0.1], [0.8, 0.6], [1.0, 1.0]] {
            let p = passages(&base_scores);
            let mut previous = -1.0;
            for n in 0..10 {
                let score = policy.score(&p, n);
                assert!(score >= previous);
                assert!((0.0..=1.0).contains(&score));
                previous = score;
            }
        }
        for n in [0, 2, 5] {
            assert!(policy.score(&passages(&[0.9]), n) >= policy.score(&passages(&[0.4]), n));
        }
    }

    #[test]
    fn test_score_saturates() {
        let policy = ScorePolicy::default();
        let p = passages(&[0.5]);
        assert_eq!(policy.score(&p, 5), policy.score(&p, 50));
        assert!((policy.score(&p, 5) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_top1_aggregation() {
        let policy = ScorePolicy {
            aggregation: ScoreAggregation::Top1,
            ..ScorePolicy::default()
        };
        assert!((policy.base(&passages(&[0.8, 0.2])) - 0.8).abs() < 1e-6);
        assert_eq!(policy.base(&[]), 0.0);
    }

    #[test]
    fn test_out_of_range_scores_clamped() {
        let policy = ScorePolicy::default();
        assert_eq!(policy.base(&passages(&[1.7])), 1.0);
        assert_eq!(policy.base(&passages(&[-0.5])), 0.0);
        let unbounded = ScorePolicy::from(&FusionConfig {
            graph_weight: 4.0,
            entity_saturation: 0,
            ..FusionConfig::default()
        });
        assert!(unbounded.score(&passages(&[0.5]), 3) <= 1.0);
    }

    #[test]
    fn test_passage_order_preserved() {
        let ranker = FusionRanker::default();
        let bundle = ranker.fuse("q", RagMethod::Traditional, passages(&[0.2, 0.9, 0.5]), None);
        let ids: Vec<_> = bundle.passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_0", "doc_1", "doc_2"]);
        assert!(bundle.entities().is_empty());
        assert_eq!(bundle.entities_used(), 0);
        assert_eq!(bundle.top_passage_score(), 0.2);
    }

    #[test]
    fn test_graph_context_order_preserved() {
        let ranker = FusionRanker::default();
        let bundle = ranker.fuse(
            "q",
            RagMethod::GraphAugmented,
            passages(&[0.5]),
            Some(cskg_context(&["XSS", "Encryption", "DDoS"])),
        );
        assert_eq!(bundle.entities(), ["XSS", "Encryption", "DDoS"]);
        let keys: Vec<_> = bundle.graph.unwrap().expansions.keys().cloned().collect();
        assert_eq!(keys, vec!["XSS", "Encryption", "DDoS"]);
    }
}

//! Lexical entity matching: which graph nodes does a text mention?

use std::sync::Arc;

use super::GraphStore;

/// Case-insensitive substring matcher over every node name.
///
/// Matching is exact and lexical: a literal mention is never missed, but
/// paraphrases and abbreviations are not recognised. Overlapping names are
/// all reported ("Encryption" and "Insufficient Encryption" both match
/// "insufficient encryption").
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    graph: Arc<GraphStore>,
    /// (lowercase name, declared name) in declaration order
    needles: Vec<(String, String)>,
}

impl EntityMatcher {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        let needles = graph
            .nodes()
            .iter()
            .map(|n| (n.name.to_lowercase(), n.name.clone()))
            .collect();
        Self { graph, needles }
    }

    /// Names of all nodes mentioned in `text`, in node declaration order.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.needles
            .iter()
            .filter(|(needle, _)| haystack.contains(needle.as_str()))
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }
}

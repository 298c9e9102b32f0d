//! Prompt rendering for both pipelines.

use crate::context::{ContextBundle, GraphContext, RagMethod};

pub const TRADITIONAL_SYSTEM: &str = "You are a helpful cybersecurity expert.";
pub const GRAPH_SYSTEM: &str = "You are a helpful cybersecurity expert with access to a knowledge graph. Provide detailed, accurate answers using the provided context and knowledge.";

/// Relations and mitigations listed per prompt are capped at this many.
const PROMPT_LIST_LIMIT: usize = 3;

/// A rendered chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: &'static str,
    pub user: String,
}

pub fn build_prompt(bundle: &ContextBundle) -> Prompt {
    match bundle.method {
        RagMethod::Traditional => Prompt {
            system: TRADITIONAL_SYSTEM,
            user: traditional_prompt(bundle),
        },
        RagMethod::GraphAugmented => Prompt {
            system: GRAPH_SYSTEM,
            user: graph_prompt(bundle),
        },
    }
}

fn traditional_prompt(bundle: &ContextBundle) -> String {
    let context = if bundle.passages.is_empty() {
        "No relevant information found.".to_string()
    } else {
        bundle
            .passages
            .iter()
            .map(|p| format!("[Document {}]: {}", p.rank, p.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Based on the following context, answer the question.\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, bundle.query
    )
}

fn graph_prompt(bundle: &ContextBundle) -> String {
    let mut parts = vec!["Based on the following information, answer the question:\n".to_string()];

    if !bundle.passages.is_empty() {
        parts.push("Retrieved Context:".to_string());
        for p in &bundle.passages {
            parts.push(format!("[Document {}]: {}", p.rank, p.text));
        }
        parts.push(String::new());
    }

    if let Some(graph) = bundle.graph.as_ref().filter(|g| !g.is_empty()) {
        parts.push("Knowledge Graph Context:".to_string());
        parts.extend(entity_lines(graph));
        parts.push(String::new());

        let mitigations = recommended_mitigations(graph);
        if !mitigations.is_empty() {
            parts.push("Recommended Mitigations:".to_string());
            parts.extend(mitigations);
            parts.push(String::new());
        }
    }

    parts.push(format!("Question: {}\n", bundle.query));
    parts.push(
        "Answer (provide a comprehensive response using both retrieved documents and knowledge graph information):"
            .to_string(),
    );
    parts.join("\n")
}

fn entity_lines(graph: &GraphContext) -> Vec<String> {
    let mut lines = Vec::new();
    for expansion in graph.expansions.values() {
        lines.push(format!(
            "- {} ({}): {}",
            expansion.name,
            expansion.kind,
            expansion
                .attributes
                .description
                .as_deref()
                .unwrap_or("No description")
        ));

        let related: Vec<String> = expansion
            .related
            .iter()
            .filter(|(_, reach)| reach.hops == 1)
            .take(PROMPT_LIST_LIMIT)
            .filter_map(|(name, reach)| {
                reach.path.first().map(|step| {
                    if step.reversed {
                        format!("{} {} it", name, step.relation)
                    } else {
                        format!("{} {}", step.relation, name)
                    }
                })
            })
            .collect();
        if !related.is_empty() {
            lines.push(format!("  Related: {}", related.join(", ")));
        }
    }
    lines
}

/// Mitigations across all entities, first-seen order, de-duplicated.
fn recommended_mitigations(graph: &GraphContext) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut lines = Vec::new();
    for route in graph
        .expansions
        .values()
        .flat_map(|e| e.mitigations.routes())
    {
        if seen.contains(&route.mitigation.as_str()) {
            continue;
        }
        seen.push(&route.mitigation);
        lines.push(format!(
            "- {} (effectiveness: {})",
            route.mitigation,
            route
                .effectiveness
                .map_or("unknown", |e| e.as_str())
        ));
        if lines.len() == PROMPT_LIST_LIMIT {
            break;
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextExpander, FusionRanker};
    use crate::graph::GraphSpec;
    use crate::retrieval::Passage;
    use std::sync::Arc;

    fn passage(text: &str) -> Passage {
        Passage {
            id: "doc_0".to_string(),
            text: text.to_string(),
            score: 0.9,
            rank: 1,
        }
    }

    fn graph_bundle(query: &str, passages: Vec<Passage>) -> ContextBundle {
        let graph = Arc::new(GraphSpec::cskg().build().unwrap());
        let expander = ContextExpander::with_limits(graph, 5, 1, 3);
        let context = expander.expand(query, &passages);
        FusionRanker::default().fuse(query, RagMethod::GraphAugmented, passages, Some(context))
    }

    #[test]
    fn test_traditional_prompt_layout() {
        let bundle = FusionRanker::default().fuse(
            "What is XSS?",
            RagMethod::Traditional,
            vec![passage("XSS injects scripts.")],
            None,
        );
        let prompt = build_prompt(&bundle);
        assert_eq!(prompt.system, TRADITIONAL_SYSTEM);
        assert_eq!(
            prompt.user,
            "Based on the following context, answer the question.\n\nContext:\n[Document 1]: XSS injects scripts.\n\nQuestion: What is XSS?\n\nAnswer:"
        );
    }

    #[test]
    fn test_traditional_prompt_without_passages() {
        let bundle = FusionRanker::default().fuse("q", RagMethod::Traditional, Vec::new(), None);
        assert!(build_prompt(&bundle).user.contains("No relevant information found."));
    }

    #[test]
    fn test_graph_prompt_sections() {
        let bundle = graph_bundle(
            "How do I stop phishing?",
            vec![passage("Phishing emails steal passwords.")],
        );
        let prompt = build_prompt(&bundle);
        assert_eq!(prompt.system, GRAPH_SYSTEM);
        let user = prompt.user;
        assert!(user.contains("Retrieved Context:\n[Document 1]: Phishing emails steal passwords."));
        assert!(user.contains(
            "- Phishing (threat): Social engineering attack to steal sensitive information"
        ));
        assert!(user.contains(
            "  Related: exploits Weak Authentication, uses Credential Stuffing, Multi-Factor Authentication mitigates it"
        ));
        assert!(user.contains(
            "Recommended Mitigations:\n- Multi-Factor Authentication (effectiveness: high)\n- Security Training (effectiveness: medium)"
        ));
        assert!(user.ends_with("knowledge graph information):"));
        let kg = user.find("Knowledge Graph Context:").unwrap();
        let question = user.find("Question: How do I stop phishing?").unwrap();
        assert!(kg < question);
    }

    #[test]
    fn test_graph_prompt_without_entities_has_no_graph_section() {
        let bundle = graph_bundle("What is the weather?", vec![passage("Sunny.")]);
        let user = build_prompt(&bundle).user;
        assert!(!user.contains("Knowledge Graph Context:"));
        assert!(!user.contains("Recommended Mitigations:"));
    }

    #[test]
    fn test_mitigations_capped_at_three() {
        let bundle = graph_bundle("malware, phishing and xss", Vec::new());
        let user = build_prompt(&bundle).user;
        let section = user.split("Recommended Mitigations:\n").nth(1).unwrap();
        let count = section.lines().take_while(|l| l.starts_with("- ")).count();
        assert_eq!(count, 3);
    }
}

//! Offline generator for demo runs: answers are stitched from the bundle
//! itself, so the whole pipeline runs without API keys.

use async_trait::async_trait;

use super::Generator;
use crate::context::{ContextBundle, RagMethod};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn render(bundle: &ContextBundle) -> String {
        let mut answer = match bundle.method {
            RagMethod::Traditional => {
                format!("[Demo Response] Based on retrieved documents: {}", bundle.query)
            }
            RagMethod::GraphAugmented => {
                format!("[Demo Response] Based on documents and KG: {}", bundle.query)
            }
        };

        if let Some(top) = bundle.passages.first() {
            answer.push(' ');
            answer.push_str(first_sentence(&top.text));
        }

        if let Some(graph) = &bundle.graph {
            let mut mitigations: Vec<&str> = Vec::new();
            for route in graph.expansions.values().flat_map(|e| e.mitigations.routes()) {
                if !mitigations.contains(&route.mitigation.as_str()) {
                    mitigations.push(&route.mitigation);
                }
            }
            if !graph.entities.is_empty() {
                answer.push_str(&format!(" Related entities: {}.", graph.entities.join(", ")));
            }
            if !mitigations.is_empty() {
                answer.push_str(&format!(" Recommended mitigations: {}.", mitigations.join(", ")));
            }
        }
        answer
    }
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(end) => &text[..=end],
        None => text,
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    async fn generate(&self, bundle: &ContextBundle) -> Result<String> {
        Ok(Self::render(bundle))
    }

    fn describe(&self) -> String {
        "template".to_string()
    }
}

//! Builds the graph-context section of a bundle from matched entities.

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::error::{KgragError, Result};
use crate::graph::{
    Effectiveness, EntityMatcher, GraphStore, MitigationPath, NodeAttributes, NodeKind,
    PathFinder, RelatedEntities,
};
use crate::retrieval::Passage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OmissionReason {
    /// Beyond the entity cap
    Capped,
    /// Matched but not resolvable in the graph
    Missing,
}

/// An entity that was matched but left out of the graph context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    pub entity: String,
    pub reason: OmissionReason,
}

/// One mitigation protecting an entity. `path` is None when no route of at
/// most `mitigation_max_depth` hops exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MitigationRoute {
    pub mitigation: String,
    pub effectiveness: Option<Effectiveness>,
    pub path: Option<MitigationPath>,
}

impl MitigationRoute {
    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "routes", rename_all = "snake_case")]
pub enum MitigationStatus {
    Found(Vec<MitigationRoute>),
    NoneFound,
    /// The entity is itself a mitigation
    NotApplicable,
}

impl MitigationStatus {
    pub fn routes(&self) -> &[MitigationRoute] {
        match self {
            MitigationStatus::Found(routes) => routes,
            _ => &[],
        }
    }
}

/// Everything the graph knows about one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityExpansion {
    pub name: String,
    pub kind: NodeKind,
    pub attributes: NodeAttributes,
    pub related: RelatedEntities,
    pub mitigations: MitigationStatus,
}

/// Graph section of a bundle: selected entities in first-seen order, their
/// expansions, and what was left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphContext {
    pub entities: Vec<String>,
    pub expansions: IndexMap<String, EntityExpansion>,
    pub omissions: Vec<Omission>,
}

impl GraphContext {
    /// Number of successfully expanded entities.
    pub fn expanded_count(&self) -> usize {
        self.expansions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expansions.is_empty()
    }
}

/// Orchestrates entity matching and path finding for one query at a time.
#[derive(Debug, Clone)]
pub struct ContextExpander {
    graph: Arc<GraphStore>,
    matcher: EntityMatcher,
    finder: PathFinder,
    max_entities: usize,
    related_depth: usize,
    mitigation_max_depth: usize,
}

impl ContextExpander {
    pub fn new(graph: Arc<GraphStore>, config: &GraphConfig) -> Self {
        Self::with_limits(
            graph,
            config.max_entities,
            config.related_depth,
            config.mitigation_max_depth,
        )
    }

    pub fn with_limits(
        graph: Arc<GraphStore>,
        max_entities: usize,
        related_depth: usize,
        mitigation_max_depth: usize,
    ) -> Self {
        Self {
            matcher: EntityMatcher::new(graph.clone()),
            finder: PathFinder::new(graph.clone()),
            graph,
            max_entities,
            related_depth,
            mitigation_max_depth,
        }
    }

    pub fn matcher(&self) -> &EntityMatcher {
        &self.matcher
    }

    /// Entities of the query, then of each passage in retrieval order,
    /// de-duplicated in first-seen order. Not capped.
    pub fn matched_entities(&self, query: &str, passages: &[Passage]) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let texts = std::iter::once(query).chain(passages.iter().map(|p| p.text.as_str()));
        for text in texts {
            for name in self.matcher.extract(text) {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
        seen
    }

    /// Graph context for a query and its retrieved passages.
    pub fn expand(&self, query: &str, passages: &[Passage]) -> GraphContext {
        let matched = self.matched_entities(query, passages);
        log::debug!("Matched {} entities: {:?}", matched.len(), matched);
        self.expand_entities(matched)
    }

    /// Expand `entities` in order, keeping the first `max_entities`. Entities
    /// that fail to resolve are recorded as omissions, never fatal.
    pub fn expand_entities(&self, entities: Vec<String>) -> GraphContext {
        let mut context = GraphContext::default();

        for (i, name) in entities.into_iter().enumerate() {
            if i >= self.max_entities {
                context.omissions.push(Omission {
                    entity: name,
                    reason: OmissionReason::Capped,
                });
                continue;
            }

            match self.expand_entity(&name) {
                Ok(expansion) => {
                    context.expansions.insert(name.clone(), expansion);
                }
                Err(e) => {
                    log::warn!("Skipping entity {} in graph context: {}", name, e);
                    context.omissions.push(Omission {
                        entity: name.clone(),
                        reason: OmissionReason::Missing,
                    });
                }
            }
            context.entities.push(name);
        }

        if !context.omissions.is_empty() {
            log::debug!("Graph context omissions: {:?}", context.omissions);
        }
        context
    }

    /// Attributes, related entities and mitigations of a single entity.
    pub fn expand_entity(&self, name: &str) -> Result<EntityExpansion> {
        let node = self.graph.node(name)?;
        let related = self.finder.related_entities(name, self.related_depth)?;

        let mitigations = if node.kind() == NodeKind::Mitigation {
            MitigationStatus::NotApplicable
        } else {
            let found = self.finder.find_mitigations(name)?;
            if found.is_empty() {
                MitigationStatus::NoneFound
            } else {
                let routes = found
                    .iter()
                    .map(|m| self.mitigation_route(m, &node.name))
                    .collect::<Result<Vec<_>>>()?;
                MitigationStatus::Found(routes)
            }
        };

        Ok(EntityExpansion {
            name: node.name.clone(),
            kind: node.kind(),
            attributes: node.attributes.clone(),
            related,
            mitigations,
        })
    }

    /// Route from `mitigation` to `target`. A missing path is recorded on the
    /// route; unknown names are errors.
    pub fn mitigation_route(&self, mitigation: &str, target: &str) -> Result<MitigationRoute> {
        let effectiveness = self.graph.attributes(mitigation)?.effectiveness();
        let path = match self
            .finder
            .mitigation_path(mitigation, target, self.mitigation_max_depth)
        {
            Ok(path) => Some(path),
            Err(e @ KgragError::NoPathFound { .. }) => {
                log::debug!("{}", e);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(MitigationRoute {
            mitigation: mitigation.to_string(),
            effectiveness,
            path,
        })
    }
}

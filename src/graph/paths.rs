//! Bounded BFS over the graph: related entities, mitigations, mitigation paths.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::{Direction, GraphStore, NodeId, NodeKind, Relation};
use crate::error::{KgragError, Result};

/// One traversed edge. `reversed` is true when the edge was walked against
/// its direction (target -> source).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub from: String,
    pub relation: Relation,
    pub to: String,
    pub reversed: bool,
}

/// How a related entity was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reach {
    pub hops: usize,
    pub path: Vec<Step>,
}

/// Reachable node name -> shortest reach, in BFS discovery order.
pub type RelatedEntities = IndexMap<String, Reach>;

/// Chain of nodes from a mitigation to the entity it protects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MitigationPath {
    pub nodes: Vec<String>,
    pub relations: Vec<Relation>,
}

impl MitigationPath {
    pub fn hops(&self) -> usize {
        self.relations.len()
    }

    pub fn mitigation(&self) -> &str {
        self.nodes.first().map(String::as_str).unwrap_or_default()
    }

    pub fn target(&self) -> &str {
        self.nodes.last().map(String::as_str).unwrap_or_default()
    }
}

/// parent of a discovered node: (predecessor, edge index, reversed)
type Parents = HashMap<NodeId, (NodeId, usize, bool)>;

/// Stateless path queries over a shared, immutable graph.
#[derive(Debug, Clone)]
pub struct PathFinder {
    graph: Arc<GraphStore>,
}

impl PathFinder {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    /// Every node within `max_depth` hops of `start` (any relation, either
    /// direction), excluding `start`. Equal-length alternatives resolve to the
    /// first one discovered.
    pub fn related_entities(&self, start: &str, max_depth: usize) -> Result<RelatedEntities> {
        let start_id = self.graph.require(start)?;
        let (order, parents) = self.bfs(start_id, max_depth, None);
        let mut related = IndexMap::with_capacity(order.len());
        for id in order {
            let path = self.steps_to(id, &parents);
            related.insert(
                self.graph.node_by_id(id).name.clone(),
                Reach {
                    hops: path.len(),
                    path,
                },
            );
        }
        Ok(related)
    }

    /// Mitigation nodes with a `mitigates`/`addresses` edge pointing at
    /// `entity` or at any node one hop away from it, in either direction.
    /// Direct mitigations come first; empty when nothing protects it.
    pub fn find_mitigations(&self, entity: &str) -> Result<Vec<String>> {
        let id = self.graph.require(entity)?;

        let mut targets = vec![id];
        for (_, _, other) in self.graph.incident_edges(id, Direction::Both) {
            if !targets.contains(&other) {
                targets.push(other);
            }
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for target in targets {
            for (_, edge, other) in self.graph.incident_edges(target, Direction::In) {
                if other == id || !edge.relation.is_protective() {
                    continue;
                }
                if self.graph.node_by_id(other).kind() != NodeKind::Mitigation {
                    continue;
                }
                if seen.insert(other) {
                    found.push(self.graph.node_by_id(other).name.clone());
                }
            }
        }
        Ok(found)
    }

    /// Shortest unweighted path from `mitigation` to `target` of at most
    /// `max_depth` hops. `NoPathFound` means "no mitigation known", not a
    /// failure.
    pub fn mitigation_path(
        &self,
        mitigation: &str,
        target: &str,
        max_depth: usize,
    ) -> Result<MitigationPath> {
        let from = self.graph.require(mitigation)?;
        let to = self.graph.require(target)?;

        if from == to {
            return Ok(MitigationPath {
                nodes: vec![self.graph.node_by_id(from).name.clone()],
                relations: Vec::new(),
            });
        }

        let (order, parents) = self.bfs(from, max_depth, Some(to));
        if !order.contains(&to) {
            return Err(KgragError::NoPathFound {
                from: mitigation.to_string(),
                to: target.to_string(),
                max_depth,
            });
        }

        let steps = self.steps_to(to, &parents);
        let mut nodes = vec![self.graph.node_by_id(from).name.clone()];
        let mut relations = Vec::with_capacity(steps.len());
        for step in steps {
            nodes.push(step.to);
            relations.push(step.relation);
        }
        Ok(MitigationPath { nodes, relations })
    }

    /// BFS over incident edges in insertion order. Returns discovered nodes
    /// (excluding `start`) in discovery order plus the parent links.
    fn bfs(&self, start: NodeId, max_depth: usize, stop_at: Option<NodeId>) -> (Vec<NodeId>, Parents) {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut order = Vec::new();
        let mut parents = Parents::new();

        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (edge_idx, edge, other) in self.graph.incident_edges(id, Direction::Both) {
                if !visited.insert(other) {
                    continue;
                }
                let reversed = edge.source != id;
                parents.insert(other, (id, edge_idx, reversed));
                order.push(other);
                if stop_at == Some(other) {
                    return (order, parents);
                }
                queue.push_back((other, depth + 1));
            }
        }

        (order, parents)
    }

    fn steps_to(&self, id: NodeId, parents: &Parents) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut current = id;
        while let Some(&(prev, edge_idx, reversed)) = parents.get(&current) {
            let edge = &self.graph.edges()[edge_idx];
            steps.push(Step {
                from: self.graph.node_by_id(prev).name.clone(),
                relation: edge.relation.clone(),
                to: self.graph.node_by_id(current).name.clone(),
                reversed,
            });
            current = prev;
        }
        steps.reverse();
        steps
    }
}

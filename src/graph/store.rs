//! In-memory typed graph store.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{Direction, Edge, Node, NodeAttributes, NodeId, NodeKind, Relation};
use crate::error::{KgragError, Result};

/// Owns the node/edge graph. Nodes keep declaration order and every node's
/// incident edges keep insertion order, which makes traversals deterministic.
#[derive(Debug, Default, Clone)]
pub struct GraphStore {
    nodes: Vec<Node>,
    /// lowercase name -> node id
    index: HashMap<String, NodeId>,
    edges: Vec<Edge>,
    edge_set: HashSet<(NodeId, Relation, NodeId)>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    /// Both directions merged, in edge insertion order.
    incident: Vec<Vec<usize>>,
}

/// Summary counts of a graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub node_types: BTreeMap<NodeKind, usize>,
    pub avg_degree: f32,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Re-adding a name (case-insensitive) with the same type is a
    /// no-op that keeps the first attributes; a different type is an error.
    pub fn add_node(&mut self, name: &str, attributes: NodeAttributes) -> Result<NodeId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KgragError::InvalidInput("node name cannot be empty".to_string()));
        }
        let key = name.to_lowercase();
        if let Some(&id) = self.index.get(&key) {
            let existing = self.nodes[id].kind();
            if existing != attributes.kind() {
                return Err(KgragError::DuplicateNode {
                    name: name.to_string(),
                    existing: existing.to_string(),
                    requested: attributes.kind().to_string(),
                });
            }
            if self.nodes[id].attributes != attributes {
                log::debug!("Node {} re-added with different attributes; keeping the first", name);
            }
            return Ok(id);
        }

        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            attributes,
        });
        self.index.insert(key, id);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.incident.push(Vec::new());
        Ok(id)
    }

    /// Add a directed edge. Both endpoints must exist; an identical triple
    /// already present is left alone.
    pub fn add_edge(&mut self, source: &str, relation: Relation, target: &str) -> Result<()> {
        let s = self.require(source)?;
        let t = self.require(target)?;
        if !self.edge_set.insert((s, relation.clone(), t)) {
            return Ok(());
        }
        let edge_id = self.edges.len();
        self.edges.push(Edge {
            source: s,
            relation,
            target: t,
        });
        self.outgoing[s].push(edge_id);
        self.incoming[t].push(edge_id);
        self.incident[s].push(edge_id);
        if s != t {
            self.incident[t].push(edge_id);
        }
        Ok(())
    }

    /// Adjacent node names, optionally filtered by relation, de-duplicated in
    /// edge insertion order.
    pub fn neighbors(
        &self,
        name: &str,
        relation: Option<&Relation>,
        direction: Direction,
    ) -> Result<Vec<String>> {
        let id = self.require(name)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, edge, other) in self.incident_edges(id, direction) {
            if relation.map_or(true, |r| &edge.relation == r) && seen.insert(other) {
                out.push(self.nodes[other].name.clone());
            }
        }
        Ok(out)
    }

    /// Names of all nodes of `kind`, in declaration order. Empty if none.
    pub fn nodes_by_type(&self, kind: NodeKind) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.kind() == kind)
            .map(|n| n.name.clone())
            .collect()
    }

    pub fn attributes(&self, name: &str) -> Result<&NodeAttributes> {
        self.node(name).map(|n| &n.attributes)
    }

    pub fn node(&self, name: &str) -> Result<&Node> {
        let id = self.require(name)?;
        Ok(&self.nodes[id])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.trim().to_lowercase())
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(&name.trim().to_lowercase()).copied()
    }

    pub fn node_by_id(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> GraphStats {
        let mut node_types: BTreeMap<NodeKind, usize> =
            NodeKind::ALL.into_iter().map(|k| (k, 0)).collect();
        for node in &self.nodes {
            *node_types.entry(node.kind()).or_insert(0) += 1;
        }
        let avg_degree = if self.nodes.is_empty() {
            0.0
        } else {
            (2 * self.edges.len()) as f32 / self.nodes.len() as f32
        };
        GraphStats {
            num_nodes: self.nodes.len(),
            num_edges: self.edges.len(),
            node_types,
            avg_degree,
        }
    }

    /// Export back into a declarative specification.
    pub fn to_spec(&self) -> super::GraphSpec {
        super::GraphSpec::from_graph(self)
    }

    /// Edges touching `id` in the given direction as (edge index, edge,
    /// node on the other end).
    pub(crate) fn incident_edges(
        &self,
        id: NodeId,
        direction: Direction,
    ) -> impl Iterator<Item = (usize, &Edge, NodeId)> + '_ {
        let list = match direction {
            Direction::Out => &self.outgoing[id],
            Direction::In => &self.incoming[id],
            Direction::Both => &self.incident[id],
        };
        list.iter().map(move |&e| {
            let edge = &self.edges[e];
            let other = if edge.source == id { edge.target } else { edge.source };
            (e, edge, other)
        })
    }

    pub(crate) fn require(&self, name: &str) -> Result<NodeId> {
        self.node_id(name)
            .ok_or_else(|| KgragError::UnknownNode(name.to_string()))
    }
}

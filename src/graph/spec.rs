//! Declarative graph specification and the built-in cybersecurity knowledge graph.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

use super::{GraphStore, NodeAttributes, NodeKind, Relation};
use crate::error::{KgragError, Result};

/// One `(name, type, attributes)` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// One `(source, relation, target)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub source: String,
    pub relation: Relation,
    pub target: String,
}

/// Fixed declarative description of a graph, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl GraphSpec {
    /// Load a specification from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "json" => Ok(serde_json::from_str(&content)?),
            "yaml" | "yml" => serde_yaml_ng::from_str(&content).map_err(|e| {
                KgragError::Parse(format!("{}: {}", path.display(), e))
            }),
            other => Err(KgragError::Parse(format!(
                "unsupported graph specification format '{}' ({})",
                other,
                path.display()
            ))),
        }
    }

    /// Populate a fresh [`GraphStore`]. Any error here is a construction
    /// error and should abort startup.
    pub fn build(&self) -> Result<GraphStore> {
        let mut graph = GraphStore::new();
        for node in &self.nodes {
            let attributes =
                NodeAttributes::from_map(&node.name, node.kind, node.attributes.clone())?;
            graph.add_node(&node.name, attributes)?;
        }
        for edge in &self.edges {
            graph.add_edge(&edge.source, edge.relation.clone(), &edge.target)?;
        }
        log::info!(
            "Knowledge graph built: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Export a graph back into a specification (declaration/insertion order).
    pub fn from_graph(graph: &GraphStore) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| NodeSpec {
                name: n.name.clone(),
                kind: n.kind(),
                attributes: n.attributes.to_map(),
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|e| EdgeSpec {
                source: graph.node_by_id(e.source).name.clone(),
                relation: e.relation.clone(),
                target: graph.node_by_id(e.target).name.clone(),
            })
            .collect();
        Self { nodes, edges }
    }

    fn node(name: &str, kind: NodeKind, attributes: Value) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            kind,
            attributes: attributes.as_object().cloned().unwrap_or_default(),
        }
    }

    fn edge(source: &str, relation: Relation, target: &str) -> EdgeSpec {
        EdgeSpec {
            source: source.to_string(),
            relation,
            target: target.to_string(),
        }
    }

    /// The built-in cybersecurity knowledge graph (CSKG).
    pub fn cskg() -> Self {
        use NodeKind::*;

        let threats = [
            ("Malware", "high", "Malicious software designed to damage or disrupt systems"),
            ("Phishing", "high", "Social engineering attack to steal sensitive information"),
            ("DDoS", "high", "Distributed Denial of Service attack"),
            ("SQL Injection", "critical", "Code injection technique targeting databases"),
            ("XSS", "medium", "Cross-Site Scripting vulnerability"),
            ("Ransomware", "critical", "Malware that encrypts data and demands ransom"),
            ("Zero-Day", "critical", "Previously unknown vulnerability"),
            ("Man-in-the-Middle", "high", "Interception of communication between two parties"),
        ];
        let vulnerabilities = [
            ("Buffer Overflow", 8.5, "Memory corruption vulnerability"),
            ("Weak Authentication", 7.0, "Insufficient authentication mechanisms"),
            ("Unpatched Software", 7.5, "Software without security updates"),
            ("Misconfiguration", 6.5, "Improper system configuration"),
            ("Insufficient Encryption", 7.0, "Weak or missing encryption"),
        ];
        let mitigations = [
            ("Multi-Factor Authentication", "high", "Multiple authentication factors"),
            ("Patch Management", "high", "Regular security updates"),
            ("Input Validation", "high", "Validate and sanitize user input"),
            ("Encryption", "high", "Data encryption at rest and in transit"),
            ("Firewall", "medium", "Network traffic filtering"),
            ("IDS/IPS", "medium", "Intrusion detection and prevention"),
            ("Security Training", "medium", "User security awareness training"),
        ];
        let attack_patterns = [
            ("Credential Stuffing", "Automated injection of stolen credentials"),
            ("Brute Force", "Systematic trial of all possible combinations"),
            ("Session Hijacking", "Takeover of a user session"),
            ("Code Injection", "Injection of malicious code"),
        ];

        let mut nodes = Vec::new();
        for (name, severity, description) in threats {
            nodes.push(Self::node(
                name,
                Threat,
                json!({"severity": severity, "description": description}),
            ));
        }
        for (name, cvss, description) in vulnerabilities {
            nodes.push(Self::node(
                name,
                Vulnerability,
                json!({"cvss": cvss, "description": description}),
            ));
        }
        for (name, effectiveness, description) in mitigations {
            nodes.push(Self::node(
                name,
                Mitigation,
                json!({"effectiveness": effectiveness, "description": description}),
            ));
        }
        for (name, description) in attack_patterns {
            nodes.push(Self::node(name, AttackPattern, json!({"description": description})));
        }

        let exploits = Relation::exploits;
        let uses = Relation::uses;
        let mitigates = Relation::mitigates;
        let addresses = Relation::addresses;
        let edges = vec![
            // threats exploit vulnerabilities
            Self::edge("Malware", exploits(), "Unpatched Software"),
            Self::edge("Phishing", exploits(), "Weak Authentication"),
            Self::edge("SQL Injection", exploits(), "Buffer Overflow"),
            Self::edge("Ransomware", exploits(), "Unpatched Software"),
            Self::edge("XSS", exploits(), "Misconfiguration"),
            Self::edge("Man-in-the-Middle", exploits(), "Insufficient Encryption"),
            // threats use attack patterns
            Self::edge("Phishing", uses(), "Credential Stuffing"),
            Self::edge("Malware", uses(), "Code Injection"),
            Self::edge("Man-in-the-Middle", uses(), "Session Hijacking"),
            // mitigations protect against threats
            Self::edge("Multi-Factor Authentication", mitigates(), "Phishing"),
            Self::edge("Multi-Factor Authentication", mitigates(), "Credential Stuffing"),
            Self::edge("Patch Management", mitigates(), "Malware"),
            Self::edge("Patch Management", mitigates(), "Ransomware"),
            Self::edge("Patch Management", mitigates(), "Zero-Day"),
            Self::edge("Input Validation", mitigates(), "SQL Injection"),
            Self::edge("Input Validation", mitigates(), "XSS"),
            Self::edge("Encryption", mitigates(), "Man-in-the-Middle"),
            Self::edge("Firewall", mitigates(), "DDoS"),
            Self::edge("IDS/IPS", mitigates(), "Malware"),
            Self::edge("Security Training", mitigates(), "Phishing"),
            // mitigations address vulnerabilities
            Self::edge("Multi-Factor Authentication", addresses(), "Weak Authentication"),
            Self::edge("Patch Management", addresses(), "Unpatched Software"),
            Self::edge("Input Validation", addresses(), "Buffer Overflow"),
            Self::edge("Encryption", addresses(), "Insufficient Encryption"),
        ];

        Self { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Direction, Effectiveness};
    use tempfile::TempDir;

    #[test]
    fn test_cskg_builds() {
        let graph = GraphSpec::cskg().build().unwrap();
        let stats = graph.stats();
        assert_eq!(stats.num_nodes, 24);
        assert_eq!(stats.num_edges, 24);
        assert_eq!(stats.node_types[&NodeKind::Threat], 8);
        assert_eq!(stats.node_types[&NodeKind::Vulnerability], 5);
        assert_eq!(stats.node_types[&NodeKind::Mitigation], 7);
        assert_eq!(stats.node_types[&NodeKind::AttackPattern], 4);
        assert!(graph.nodes_by_type(NodeKind::Threat).contains(&"Phishing".to_string()));
        assert_eq!(
            graph.attributes("Firewall").unwrap().effectiveness(),
            Some(Effectiveness::Medium)
        );
    }

    #[test]
    fn test_build_rejects_dangling_edge() {
        let mut spec = GraphSpec::cskg();
        spec.edges.push(GraphSpec::edge("Firewall", Relation::mitigates(), "Botnet"));
        assert!(matches!(spec.build(), Err(KgragError::UnknownNode(ref n)) if n == "Botnet"));
    }

    #[test]
    fn test_build_rejects_type_conflict() {
        let mut spec = GraphSpec::cskg();
        spec.nodes.push(GraphSpec::node(
            "phishing",
            NodeKind::AttackPattern,
            json!({}),
        ));
        assert!(matches!(spec.build(), Err(KgragError::DuplicateNode { .. })));
    }

    #[test]
    fn test_build_rejects_invalid_attributes() {
        let spec = GraphSpec {
            nodes: vec![GraphSpec::node("Worm", NodeKind::Threat, json!({"severity": "apocalyptic"}))],
            edges: vec![],
        };
        assert!(matches!(spec.build(), Err(KgragError::InvalidAttribute { .. })));
    }

    #[test]
    fn test_export_roundtrip() {
        let graph = GraphSpec::cskg().build().unwrap();
        let exported = GraphSpec::from_graph(&graph);
        assert_eq!(exported, GraphSpec::cskg());
        let rebuilt = exported.build().unwrap();
        assert_eq!(rebuilt.stats(), graph.stats());
    }

    #[test]
    fn test_from_path_json_and_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("graph.json");
        std::fs::write(
            &json_path,
            r#"{"nodes":[{"name":"Phishing","type":"threat","severity":"high"},
                         {"name":"MFA","type":"mitigation","effectiveness":"high"}],
                "edges":[{"source":"MFA","relation":"mitigates","target":"Phishing"}]}"#,
        )
        .unwrap();
        let graph = GraphSpec::from_path(&json_path).unwrap().build().unwrap();
        assert_eq!(
            graph.neighbors("MFA", Some(&Relation::mitigates()), Direction::Out).unwrap(),
            vec!["Phishing"]
        );

        let yaml_path = temp_dir.path().join("graph.yaml");
        std::fs::write(
            &yaml_path,
            "nodes:\n  - name: Brute Force\n    type: attack_pattern\nedges: []\n",
        )
        .unwrap();
        let graph = GraphSpec::from_path(&yaml_path).unwrap().build().unwrap();
        assert!(graph.contains("brute force"));

        let bad_path = temp_dir.path().join("graph.csv");
        std::fs::write(&bad_path, "x").unwrap();
        assert!(matches!(GraphSpec::from_path(&bad_path), Err(KgragError::Parse(_))));
    }
}

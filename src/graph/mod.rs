//! Knowledge graph module: typed node/edge store, specification loader,
//! entity matching and path finding.
//!
//! The graph is built once from a declarative [`GraphSpec`] and shared
//! read-only (`Arc<GraphStore>`) by every query afterwards.

mod matcher;
mod paths;
mod spec;
mod store;

pub use matcher::EntityMatcher;
pub use paths::{MitigationPath, PathFinder, Reach, RelatedEntities, Step};
pub use spec::{EdgeSpec, GraphSpec, NodeSpec};
pub use store::{GraphStats, GraphStore};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{KgragError, Result};

/// Index of a node in declaration order.
pub type NodeId = usize;

/// The closed set of entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Threat,
    Vulnerability,
    Mitigation,
    AttackPattern,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Threat,
        NodeKind::Vulnerability,
        NodeKind::Mitigation,
        NodeKind::AttackPattern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Threat => "threat",
            NodeKind::Vulnerability => "vulnerability",
            NodeKind::Mitigation => "mitigation",
            NodeKind::AttackPattern => "attack_pattern",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        NodeKind::ALL.into_iter().find(|k| k.as_str() == s.trim())
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge label. An open set: any non-empty lowercase name is accepted, the
/// associated constructors cover the relations the CSKG uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Relation(String);

impl Relation {
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(KgragError::InvalidInput(
                "relation name cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn exploits() -> Self {
        Self("exploits".to_string())
    }

    pub fn uses() -> Self {
        Self("uses".to_string())
    }

    pub fn mitigates() -> Self {
        Self("mitigates".to_string())
    }

    pub fn addresses() -> Self {
        Self("addresses".to_string())
    }

    /// True for the relations that point from a mitigation at what it protects.
    pub fn is_protective(&self) -> bool {
        self.0 == "mitigates" || self.0 == "addresses"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Relation {
    type Error = KgragError;

    fn try_from(value: String) -> Result<Self> {
        Relation::new(&value)
    }
}

impl From<Relation> for String {
    fn from(value: Relation) -> Self {
        value.0
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which incident edges a neighbor lookup follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
    In,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effectiveness {
    Low,
    Medium,
    High,
}

impl Effectiveness {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Effectiveness::Low),
            "medium" => Some(Effectiveness::Medium),
            "high" => Some(Effectiveness::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Effectiveness::Low => "low",
            Effectiveness::Medium => "medium",
            Effectiveness::High => "high",
        }
    }
}

impl fmt::Display for Effectiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific attributes. The variant fixes the node's type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityDetail {
    Threat { severity: Severity },
    Vulnerability { cvss: f64 },
    Mitigation { effectiveness: Effectiveness },
    AttackPattern,
}

impl EntityDetail {
    pub fn kind(&self) -> NodeKind {
        match self {
            EntityDetail::Threat { .. } => NodeKind::Threat,
            EntityDetail::Vulnerability { .. } => NodeKind::Vulnerability,
            EntityDetail::Mitigation { .. } => NodeKind::Mitigation,
            EntityDetail::AttackPattern => NodeKind::AttackPattern,
        }
    }
}

/// Validated attribute bag of a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAttributes {
    #[serde(flatten)]
    pub detail: EntityDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keys outside the per-type schema, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NodeAttributes {
    pub fn new(detail: EntityDetail) -> Self {
        Self {
            detail,
            description: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn threat(severity: Severity) -> Self {
        Self::new(EntityDetail::Threat { severity })
    }

    pub fn vulnerability(cvss: f64) -> Self {
        Self::new(EntityDetail::Vulnerability { cvss })
    }

    pub fn mitigation(effectiveness: Effectiveness) -> Self {
        Self::new(EntityDetail::Mitigation { effectiveness })
    }

    pub fn attack_pattern() -> Self {
        Self::new(EntityDetail::AttackPattern)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.detail.kind()
    }

    /// Effectiveness of a mitigation node, `None` for other types.
    pub fn effectiveness(&self) -> Option<Effectiveness> {
        match self.detail {
            EntityDetail::Mitigation { effectiveness } => Some(effectiveness),
            _ => None,
        }
    }

    /// Validate a loosely-typed attribute map against the schema of `kind`.
    /// Schema keys are consumed; everything else lands in `extra`.
    pub fn from_map(node: &str, kind: NodeKind, mut map: Map<String, Value>) -> Result<Self> {
        let invalid = |reason: String| KgragError::InvalidAttribute {
            node: node.to_string(),
            reason,
        };

        let detail = match kind {
            NodeKind::Threat => {
                let raw = map
                    .remove("severity")
                    .ok_or_else(|| invalid("threat requires `severity`".to_string()))?;
                let severity = raw
                    .as_str()
                    .and_then(Severity::parse)
                    .ok_or_else(|| invalid(format!("unknown severity {}", raw)))?;
                EntityDetail::Threat { severity }
            }
            NodeKind::Vulnerability => {
                let raw = map
                    .remove("cvss")
                    .ok_or_else(|| invalid("vulnerability requires `cvss`".to_string()))?;
                let cvss = raw
                    .as_f64()
                    .ok_or_else(|| invalid(format!("cvss must be a number, got {}", raw)))?;
                if !(0.0..=10.0).contains(&cvss) {
                    return Err(invalid(format!("cvss {} outside 0.0-10.0", cvss)));
                }
                EntityDetail::Vulnerability { cvss }
            }
            NodeKind::Mitigation => {
                let raw = map.remove("effectiveness").ok_or_else(|| {
                    invalid("mitigation requires `effectiveness`".to_string())
                })?;
                let effectiveness = raw
                    .as_str()
                    .and_then(Effectiveness::parse)
                    .ok_or_else(|| invalid(format!("unknown effectiveness {}", raw)))?;
                EntityDetail::Mitigation { effectiveness }
            }
            NodeKind::AttackPattern => EntityDetail::AttackPattern,
        };

        let description = match map.remove("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => return Err(invalid(format!("description must be a string, got {}", other))),
        };

        Ok(Self {
            detail,
            description,
            extra: map.into_iter().collect(),
        })
    }

    /// Inverse of [`NodeAttributes::from_map`] (without the `type` key).
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self.extra.clone().into_iter().collect();
        match &self.detail {
            EntityDetail::Threat { severity } => {
                map.insert("severity".to_string(), Value::from(severity.as_str()));
            }
            EntityDetail::Vulnerability { cvss } => {
                map.insert("cvss".to_string(), Value::from(*cvss));
            }
            EntityDetail::Mitigation { effectiveness } => {
                map.insert("effectiveness".to_string(), Value::from(effectiveness.as_str()));
            }
            EntityDetail::AttackPattern => {}
        }
        if let Some(ref d) = self.description {
            map.insert("description".to_string(), Value::from(d.as_str()));
        }
        map
    }
}

/// A named entity in the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Declared spelling; lookups are case-insensitive.
    pub name: String,
    pub attributes: NodeAttributes,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.attributes.kind()
    }
}

/// Directed, labelled edge between two existing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: NodeId,
    pub relation: Relation,
    pub target: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_relation_normalized() {
        let r = Relation::new("  Mitigates ").unwrap();
        assert_eq!(r, Relation::mitigates());
        assert!(r.is_protective());
        assert!(!Relation::exploits().is_protective());
    }

    #[test]
    fn test_relation_open_set() {
        let r = Relation::new("detects").unwrap();
        assert_eq!(r.as_str(), "detects");
        assert!(Relation::new("   ").is_err());
    }

    #[test]
    fn test_node_kind_parse() {
        assert_eq!(NodeKind::parse("attack_pattern"), Some(NodeKind::AttackPattern));
        assert_eq!(NodeKind::parse("actor"), None);
    }

    #[test]
    fn test_from_map_threat() {
        let attrs = NodeAttributes::from_map(
            "Phishing",
            NodeKind::Threat,
            as_map(json!({"severity": "High", "description": "lure", "vector": "email"})),
        )
        .unwrap();
        assert_eq!(attrs.detail, EntityDetail::Threat { severity: Severity::High });
        assert_eq!(attrs.description.as_deref(), Some("lure"));
        assert_eq!(attrs.extra.get("vector"), Some(&json!("email")));
    }

    #[test]
    fn test_from_map_missing_required() {
        let err = NodeAttributes::from_map("MFA", NodeKind::Mitigation, Map::new()).unwrap_err();
        assert!(matches!(err, KgragError::InvalidAttribute { .. }));
        assert!(err.to_string().contains("effectiveness"));
    }

    #[test]
    fn test_from_map_cvss_range() {
        let err = NodeAttributes::from_map(
            "Buffer Overflow",
            NodeKind::Vulnerability,
            as_map(json!({"cvss": 11.0})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_cvss_roundtrips_exactly() {
        let original = as_map(json!({"cvss": 7.1, "description": "weak ciphers"}));
        let attrs =
            NodeAttributes::from_map("Insufficient Encryption", NodeKind::Vulnerability, original.clone())
                .unwrap();
        assert_eq!(attrs.detail, EntityDetail::Vulnerability { cvss: 7.1 });
        assert_eq!(attrs.to_map(), original);
        assert_eq!(attrs.to_map()["cvss"], json!(7.1));
    }

    #[test]
    fn test_map_roundtrip_keeps_extra() {
        let original = as_map(json!({"effectiveness": "medium", "description": "filter", "vendor": "any"}));
        let attrs = NodeAttributes::from_map("Firewall", NodeKind::Mitigation, original.clone()).unwrap();
        assert_eq!(attrs.to_map(), original);
        assert_eq!(attrs.effectiveness(), Some(Effectiveness::Medium));
    }

    #[test]
    fn test_attributes_serialize_tagged() {
        let attrs = NodeAttributes::threat(Severity::Critical).with_description("db attack");
        let v = serde_json::to_value(&attrs).unwrap();
        assert_eq!(v["type"], "threat");
        assert_eq!(v["severity"], "critical");
        assert_eq!(v["description"], "db attack");
    }
}

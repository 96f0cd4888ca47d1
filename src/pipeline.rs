//! Pipeline definition: nodes, edges, node configuration
//!
//! Pipelines serialize to YAML (files) and JSON (APIs) with camelCase keys.
//! Ids are minted as v4 uuids by the factory constructors; hand-written
//! definitions may use any unique strings.

use crate::join::JoinKind;
use crate::transform::Transform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf: pulls a table from a source provider
    Dataset,
    /// Single input, ordered transform chain
    Transform,
    /// Two inputs (left/right ports), hash join or union
    Join,
    /// Single input, terminal pass-through
    Output,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub config: NodeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Dataset nodes: which source table to pull
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Transform nodes: the ordered chain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<Transform>,
    /// Join nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSettings {
    #[serde(default)]
    pub kind: JoinMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_key: Option<String>,
}

/// A join node either key-joins or unions its two inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
    Union,
}

impl JoinMode {
    pub fn as_join_kind(self) -> Option<JoinKind> {
        match self {
            JoinMode::Inner => Some(JoinKind::Inner),
            JoinMode::Left => Some(JoinKind::Left),
            JoinMode::Right => Some(JoinKind::Right),
            JoinMode::Outer => Some(JoinKind::Outer),
            JoinMode::Union => None,
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            config: NodeConfig::default(),
        }
    }

    pub fn dataset(source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        let mut node = Node::new(NodeKind::Dataset, source_id.clone());
        node.config.source_id = Some(source_id);
        node
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Which output of the source feeds this edge (unused today, reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    /// Which input of the target this edge feeds ("left"/"right" on joins)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            target: target.into(),
            source_port: None,
            target_port: None,
        }
    }

    pub fn with_target_port(mut self, port: impl Into<String>) -> Self {
        self.target_port = Some(port.into());
        self
    }
}

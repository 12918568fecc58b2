//! Shortest-path graph types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A node in a graph response, keyed by index in [`GraphResponse::nodes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "objectId", default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// A directed edge between two node indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: String,
}

/// `GET /api/v2/graphs/shortest-path` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphResponse {
    #[serde(default)]
    pub nodes: BTreeMap<String, GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphResponse {
    /// Label of the node at `index`, if present
    pub fn label(&self, index: &str) -> Option<&str> {
        self.nodes.get(index).map(|n| n.label.as_str())
    }
}

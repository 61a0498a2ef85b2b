//! Graph data model extracted from a diagram description.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Separator used by `edge_types` keys on the wire: `"Client->API Gateway"`.
pub const EDGE_KEY_SEPARATOR: &str = "->";

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into() }
    }
}

/// A parsed architecture graph.
///
/// Node names are unique. Edges may repeat. Annotation, layer and edge type
/// keys are not required to cover every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
    /// Node name → short description.
    pub annotations: BTreeMap<String, String>,
    /// Layer name → member node names, in declaration order.
    pub layers: BTreeMap<String, Vec<String>>,
    /// (source, target) → style tag.
    pub edge_types: BTreeMap<(String, String), String>,
}

impl Graph {
    /// A graph with only nodes and edges.
    #[must_use]
    pub fn new(nodes: Vec<String>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges, ..Self::default() }
    }

    #[must_use]
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn annotation(&self, node: &str) -> Option<&str> {
        self.annotations.get(node).map(String::as_str)
    }

    #[must_use]
    pub fn edge_type(&self, source: &str, target: &str) -> Option<&str> {
        self.edge_types
            .get(&(source.to_owned(), target.to_owned()))
            .map(String::as_str)
    }

    /// The graph in its JSON wire shape.
    #[must_use]
    pub fn to_json(&self) -> GraphJson {
        GraphJson::from(self)
    }
}

impl Serialize for Graph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// =============================================================================
// WIRE SHAPE
// =============================================================================

/// `{ "nodes": [..], "edges": [[src, dst]], "annotations"?, "layers"?, "edge_types"? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphJson {
    pub nodes: Vec<String>,
    pub edges: Vec<[String; 2]>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edge_types: BTreeMap<String, String>,
}

impl From<&Graph> for GraphJson {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes.clone(),
            edges: graph
                .edges
                .iter()
                .map(|e| [e.source.clone(), e.target.clone()])
                .collect(),
            annotations: graph.annotations.clone(),
            layers: graph.layers.clone(),
            edge_types: graph
                .edge_types
                .iter()
                .map(|((src, dst), tag)| (edge_type_key(src, dst), tag.clone()))
                .collect(),
        }
    }
}

/// Wire key for an edge type entry.
#[must_use]
pub fn edge_type_key(source: &str, target: &str) -> String {
    format!("{source}{EDGE_KEY_SEPARATOR}{target}")
}

/// Split a `"src->dst"` key. Both halves must be non-empty after trimming.
#[must_use]
pub fn split_edge_type_key(key: &str) -> Option<(String, String)> {
    let (src, dst) = key.split_once(EDGE_KEY_SEPARATOR)?;
    let (src, dst) = (src.trim(), dst.trim());
    if src.is_empty() || dst.is_empty() {
        return None;
    }
    Some((src.to_owned(), dst.to_owned()))
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;

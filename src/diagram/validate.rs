//! Structural checks on a parsed graph.
//!
//! Every rule is checked independently and all violations are collected. In
//! strict mode any non-warning violation fails the call; lenient mode hands
//! the graph back unmodified with the violations attached. Dropping dangling
//! edges or members is left to the caller.

use std::fmt;

use serde::Serialize;

use super::graph::Graph;
use crate::error::SketchError;

pub const MIN_NODES: usize = 2;
pub const MAX_NODES: usize = 20;
pub const MAX_ANNOTATION_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// An endpoint of a dangling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Source,
    Target,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Violation {
    #[serde(rename = "NodeCountViolation")]
    NodeCount { count: usize, min: usize, max: usize },
    DanglingEdge { source: String, target: String, missing: Endpoint },
    DanglingLayerMember { layer: String, node: String },
    /// Quality signal only. Never promoted to an error.
    AnnotationTooLong { node: String, length: usize, max: usize },
}

impl Violation {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeCount { .. } => "NodeCountViolation",
            Self::DanglingEdge { .. } => "DanglingEdge",
            Self::DanglingLayerMember { .. } => "DanglingLayerMember",
            Self::AnnotationTooLong { .. } => "AnnotationTooLong",
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::AnnotationTooLong { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeCount { count, min, max } => {
                write!(f, "{}: graph has {count} node(s), expected {min}..={max}", self.kind())
            }
            Self::DanglingEdge { source, target, missing } => {
                let which = match missing {
                    Endpoint::Source => "source",
                    Endpoint::Target => "target",
                    Endpoint::Both => "both endpoints",
                };
                write!(f, "{}: edge {source} -> {target} references unknown {which}", self.kind())
            }
            Self::DanglingLayerMember { layer, node } => {
                write!(f, "{}: layer {layer:?} lists unknown node {node:?}", self.kind())
            }
            Self::AnnotationTooLong { node, length, max } => {
                write!(f, "{}: annotation for {node:?} is {length} chars (max {max})", self.kind())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub graph: Graph,
    pub violations: Vec<Violation>,
}

/// Collect every violation in `graph`.
#[must_use]
pub fn check(graph: &Graph) -> Vec<Violation> {
    let mut violations = Vec::new();

    let count = graph.nodes.len();
    if !(MIN_NODES..=MAX_NODES).contains(&count) {
        violations.push(Violation::NodeCount { count, min: MIN_NODES, max: MAX_NODES });
    }

    for edge in &graph.edges {
        let missing = match (graph.has_node(&edge.source), graph.has_node(&edge.target)) {
            (true, true) => continue,
            (false, true) => Endpoint::Source,
            (true, false) => Endpoint::Target,
            (false, false) => Endpoint::Both,
        };
        violations.push(Violation::DanglingEdge {
            source: edge.source.clone(),
            target: edge.target.clone(),
            missing,
        });
    }

    for (layer, members) in &graph.layers {
        for node in members.iter().filter(|m| !graph.has_node(m)) {
            violations.push(Violation::DanglingLayerMember { layer: layer.clone(), node: node.clone() });
        }
    }

    for (node, text) in &graph.annotations {
        let length = text.chars().count();
        if length > MAX_ANNOTATION_CHARS {
            violations.push(Violation::AnnotationTooLong { node: node.clone(), length, max: MAX_ANNOTATION_CHARS });
        }
    }

    violations
}

/// Validate `graph`, failing in strict mode on any structural violation.
///
/// # Errors
///
/// `SketchError::Validation` carrying the full violation list, warnings
/// included, when `strict` is set and at least one violation is an error.
pub fn validate(graph: Graph, strict: bool) -> Result<ValidationReport, SketchError> {
    let violations = check(&graph);
    if strict {
        let errors = violations.iter().filter(|v| !v.is_warning()).count();
        if errors > 0 {
            return Err(SketchError::Validation {
                message: format!("graph has {errors} structural violation(s)"),
                violations,
            });
        }
    }
    Ok(ValidationReport { graph, violations })
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;

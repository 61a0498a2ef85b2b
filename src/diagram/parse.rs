//! Response parser: raw completion text to explanation plus validated graph.
//!
//! DESIGN
//! ======
//! 1. Split the text on section markers (`sections`).
//! 2. Decode the diagram section as a JSON object.
//! 3. On failure walk the repair ladder. Strategies compose, each one
//!    running on the previous output, and a strategy that changes nothing
//!    is recorded without a decode attempt.
//! 4. If still undecodable and enabled, hand the diagram text to the
//!    assisted repair once and walk steps 2-3 on its reply.
//! 5. Coerce the decoded object into a `Graph` and validate it.
//!
//! Undecodable input is a `SketchError::Parse` carrying the raw text. An
//! empty graph is never returned in its place, so an object without a
//! `nodes` array does not count as decoded.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::graph::{Edge, Graph, split_edge_type_key};
use super::repair::{AssistedRepair, RepairStrategy};
use super::sections::split_sections;
use super::validate::{Violation, validate};
use crate::error::SketchError;
use crate::metrics::ParseMetrics;

/// Name recorded for the assisted step in attempt lists and `resolved_by`.
pub const ASSISTED_REPAIR: &str = "assisted_repair";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Allow one assisted repair when the syntactic ladder fails.
    pub assisted_repair: bool,
    /// Fail on structural violations instead of attaching them.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: RepairStrategy,
    /// The strategy changed the text.
    pub applied: bool,
    /// The changed text decoded.
    pub succeeded: bool,
    /// Run on the assisted repair's reply rather than the original text.
    pub after_assist: bool,
}

/// What one parse did, for metrics and debugging views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseDelta {
    pub decoded_directly: bool,
    pub attempts: Vec<StrategyAttempt>,
    /// `None` when assisted repair was not invoked.
    pub assisted_repair: Option<bool>,
    pub resolved_by: Option<String>,
}

impl ParseDelta {
    /// Names of every step tried, in order.
    #[must_use]
    pub fn tried(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.attempts.len() + 1);
        let mut assist_listed = false;
        for attempt in &self.attempts {
            if attempt.after_assist && !assist_listed {
                names.push(ASSISTED_REPAIR.to_owned());
                assist_listed = true;
            }
            names.push(attempt.strategy.name().to_owned());
        }
        if self.assisted_repair.is_some() && !assist_listed {
            names.push(ASSISTED_REPAIR.to_owned());
        }
        names
    }

    /// Number of repair strategies run, whether or not they changed anything.
    #[must_use]
    pub fn repair_attempts(&self) -> usize {
        self.attempts.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub explanation: String,
    pub graph: Graph,
    /// Warnings in strict mode, every violation in lenient mode.
    pub violations: Vec<Violation>,
    pub delta: ParseDelta,
}

// =============================================================================
// PARSER
// =============================================================================

pub struct ResponseParser {
    metrics: Arc<ParseMetrics>,
}

impl ResponseParser {
    #[must_use]
    pub fn new(metrics: Arc<ParseMetrics>) -> Self {
        Self { metrics }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ParseMetrics> {
        &self.metrics
    }

    /// Parse one raw completion.
    ///
    /// # Errors
    ///
    /// - `SketchError::Parse` when the diagram section stays undecodable.
    /// - `SketchError::Validation` when `options.strict` is set and the graph
    ///   has structural violations.
    pub async fn parse(
        &self,
        raw: &str,
        options: ParseOptions,
        repair: Option<&dyn AssistedRepair>,
    ) -> Result<ParseOutcome, SketchError> {
        let mut delta = ParseDelta::default();
        let result = parse_with(raw, options, repair, &mut delta).await;
        self.metrics.record(&delta, result.is_ok());
        result
    }
}

async fn parse_with(
    raw: &str,
    options: ParseOptions,
    repair: Option<&dyn AssistedRepair>,
    delta: &mut ParseDelta,
) -> Result<ParseOutcome, SketchError> {
    if raw.trim().is_empty() {
        warn!("parse: empty completion text");
        return Err(SketchError::Parse { raw: raw.to_owned(), attempted: Vec::new() });
    }

    let doc = split_sections(raw);
    if !doc.diagram_marker_found {
        debug!("parse: diagram marker missing; scanning whole section");
    }

    let mut decoded = decode_ladder(&doc.diagram_raw, false, delta);

    if decoded.is_none() && options.assisted_repair {
        match repair {
            Some(repair) => decoded = assisted(repair, &doc.diagram_raw, delta).await,
            None => warn!("parse: assisted repair enabled but no repairer configured"),
        }
    }

    let Some(object) = decoded else {
        warn!(tried = ?delta.tried(), "parse: diagram JSON undecodable");
        return Err(SketchError::Parse { raw: raw.to_owned(), attempted: delta.tried() });
    };

    let graph = coerce_graph(&object);
    let report = validate(graph, options.strict)?;
    info!(
        nodes = report.graph.nodes.len(),
        edges = report.graph.edges.len(),
        violations = report.violations.len(),
        resolved_by = delta.resolved_by.as_deref().unwrap_or("direct"),
        "parse: diagram parsed"
    );

    Ok(ParseOutcome {
        explanation: doc.explanation,
        graph: report.graph,
        violations: report.violations,
        delta: delta.clone(),
    })
}

async fn assisted(repair: &dyn AssistedRepair, broken: &str, delta: &mut ParseDelta) -> Option<Map<String, Value>> {
    info!(chars = broken.len(), "parse: invoking assisted repair");
    let decoded = match repair.repair(broken).await {
        Ok(fixed) => decode_ladder(&fixed, true, delta),
        Err(e) => {
            warn!(error = %e, "parse: assisted repair failed");
            None
        }
    };
    delta.assisted_repair = Some(decoded.is_some());
    decoded
}

// =============================================================================
// DECODE LADDER
// =============================================================================

/// A decode only counts when it yields an object with a `nodes` array.
fn decode(text: &str) -> Option<Map<String, Value>> {
    let object: Map<String, Value> = serde_json::from_str(text).ok()?;
    matches!(object.get("nodes"), Some(Value::Array(_))).then_some(object)
}

fn decode_ladder(text: &str, after_assist: bool, delta: &mut ParseDelta) -> Option<Map<String, Value>> {
    if let Some(object) = decode(text) {
        if after_assist {
            delta.resolved_by = Some(ASSISTED_REPAIR.to_owned());
        } else {
            delta.decoded_directly = true;
        }
        return Some(object);
    }

    let mut current = text.to_owned();
    for strategy in RepairStrategy::LADDER {
        let next = strategy.apply(&current);
        let applied = next != current;
        let decoded = if applied { decode(&next) } else { None };
        let succeeded = decoded.is_some();
        debug!(strategy = strategy.name(), applied, succeeded, after_assist, "parse: repair strategy");
        delta.attempts.push(StrategyAttempt { strategy, applied, succeeded, after_assist });
        if succeeded {
            delta.resolved_by = Some(strategy.name().to_owned());
            return decoded;
        }
        current = next;
    }
    None
}

// =============================================================================
// COERCION
// =============================================================================

/// Scalars that read naturally as names. Objects, arrays and null do not.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn node_name(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Number(_) => scalar_text(value),
        _ => None,
    }
}

fn edge_from(value: &Value) -> Option<Edge> {
    let (source, target) = match value {
        Value::Array(items) if items.len() >= 2 => (node_name(&items[0])?, node_name(&items[1])?),
        Value::Object(map) => {
            let source = map.get("from").or_else(|| map.get("source"))?;
            let target = map.get("to").or_else(|| map.get("target"))?;
            (node_name(source)?, node_name(target)?)
        }
        Value::String(s) => split_edge_type_key(s)?,
        _ => return None,
    };
    Some(Edge { source, target })
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| {
            let key = k.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), scalar_text(v)?))
        })
        .collect()
}

/// Shape a decoded object into a `Graph`. Unknown keys are ignored and
/// malformed entries dropped.
pub(crate) fn coerce_graph(object: &Map<String, Value>) -> Graph {
    let mut graph = Graph::default();

    if let Some(Value::Array(nodes)) = object.get("nodes") {
        for name in nodes.iter().filter_map(node_name) {
            if !graph.has_node(&name) {
                graph.nodes.push(name);
            }
        }
    }

    if let Some(Value::Array(edges)) = object.get("edges") {
        graph.edges = edges.iter().filter_map(edge_from).collect();
    }

    graph.annotations = string_map(object.get("annotations"));

    if let Some(Value::Object(layers)) = object.get("layers") {
        for (name, members) in layers {
            let name = name.trim();
            let Value::Array(members) = members else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            graph
                .layers
                .insert(name.to_owned(), members.iter().filter_map(node_name).collect());
        }
    }

    for (key, tag) in string_map(object.get("edge_types")) {
        match split_edge_type_key(&key) {
            Some(pair) => {
                graph.edge_types.insert(pair, tag);
            }
            None => debug!(%key, "parse: ignoring malformed edge type key"),
        }
    }

    graph
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;

//! Graphviz DOT source for a validated graph.
//!
//! Structure only: clusters per layer, labelled nodes and edges. Colors,
//! fonts and shapes are left to the renderer's defaults.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use super::graph::Graph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankDir {
    #[default]
    LeftRight,
    TopBottom,
    RightLeft,
    BottomTop,
}

impl RankDir {
    fn as_dot(self) -> &'static str {
        match self {
            Self::LeftRight => "LR",
            Self::TopBottom => "TB",
            Self::RightLeft => "RL",
            Self::BottomTop => "BT",
        }
    }
}

impl fmt::Display for RankDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_dot())
    }
}

impl FromStr for RankDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LR" => Ok(Self::LeftRight),
            "TB" => Ok(Self::TopBottom),
            "RL" => Ok(Self::RightLeft),
            "BT" => Ok(Self::BottomTop),
            other => Err(format!("unknown rank direction: {other} (expected LR, TB, RL or BT)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotOptions {
    pub rankdir: RankDir,
    /// Label line width in chars. Zero disables wrapping.
    pub wrap_width: usize,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self { rankdir: RankDir::default(), wrap_width: 20 }
    }
}

/// Emit a `digraph` for `graph`.
///
/// Layer members and edges naming unknown nodes are skipped. A node listed
/// in several layers lands in the first one.
#[must_use]
pub fn build_dot(graph: &Graph, options: &DotOptions) -> String {
    for (layer, members) in &graph.layers {
        for member in members.iter().filter(|m| !graph.has_node(m)) {
            warn!(%layer, node = %member, "dot: skipping unknown layer member");
        }
    }
    for edge in graph.edges.iter().filter(|e| !graph.has_node(&e.source) || !graph.has_node(&e.target)) {
        warn!(source = %edge.source, target = %edge.target, "dot: skipping dangling edge");
    }

    let source = Dot { graph, options }.to_string();
    debug!(bytes = source.len(), nodes = graph.nodes.len(), "dot: source built");
    source
}

struct Dot<'a> {
    graph: &'a Graph,
    options: &'a DotOptions,
}

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph;
        let mut placed: Vec<&str> = Vec::with_capacity(graph.nodes.len());

        writeln!(f, "digraph architecture {{")?;
        writeln!(f, "  rankdir={};", self.options.rankdir)?;

        for (idx, (layer, members)) in graph.layers.iter().enumerate() {
            writeln!(f, "  subgraph {} {{", quote(&format!("cluster_{idx}_{layer}")))?;
            writeln!(f, "    label={};", quote(&layer.to_uppercase()))?;
            for member in members {
                if !graph.has_node(member) || placed.contains(&member.as_str()) {
                    continue;
                }
                placed.push(member);
                self.node(f, "    ", member)?;
            }
            writeln!(f, "  }}")?;
        }

        for node in &graph.nodes {
            if !placed.contains(&node.as_str()) {
                self.node(f, "  ", node)?;
            }
        }

        for edge in &graph.edges {
            if !graph.has_node(&edge.source) || !graph.has_node(&edge.target) {
                continue;
            }
            write!(f, "  {} -> {}", quote(&edge.source), quote(&edge.target))?;
            if let Some(tag) = graph.edge_type(&edge.source, &edge.target) {
                write!(f, " [label={}]", quote(tag))?;
            }
            writeln!(f, ";")?;
        }

        writeln!(f, "}}")
    }
}

impl Dot<'_> {
    fn node(&self, f: &mut fmt::Formatter<'_>, indent: &str, node: &str) -> fmt::Result {
        let label = match self.graph.annotation(node).map(str::trim).filter(|d| !d.is_empty()) {
            Some(desc) => format!("{node}\n{desc}"),
            None => node.to_owned(),
        };
        writeln!(f, "{indent}{} [label={}];", quote(node), quote(&wrap(&label, self.options.wrap_width)))
    }
}

/// Greedy word wrap. Existing line breaks are kept and words longer than
/// `width` stay whole.
fn wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_owned();
    }
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// DOT double-quoted ID. Newlines become `\n` line breaks.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
#[path = "dot_test.rs"]
mod tests;

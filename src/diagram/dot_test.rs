use super::*;
use crate::diagram::graph::Edge;

fn sample() -> Graph {
    let mut graph = Graph::new(
        vec!["Client".into(), "API".into(), "DB".into()],
        vec![Edge::new("Client", "API"), Edge::new("API", "DB"), Edge::new("API", "Ghost")],
    );
    graph.layers.insert("Data".into(), vec!["DB".into(), "Missing".into()]);
    graph.annotations.insert("API".into(), "REST backend".into());
    graph.edge_types.insert(("API".into(), "DB".into()), "sql".into());
    graph
}

#[test]
fn builds_clusters_nodes_and_edges() {
    let dot = build_dot(&sample(), &DotOptions::default());
    assert!(dot.starts_with("digraph architecture {\n  rankdir=LR;\n"));
    assert!(dot.contains("  subgraph \"cluster_0_Data\" {\n    label=\"DATA\";\n    \"DB\" [label=\"DB\"];\n  }\n"));
    assert!(dot.contains("  \"Client\" [label=\"Client\"];\n"));
    assert!(dot.contains("  \"API\" [label=\"API\\nREST backend\"];\n"));
    assert!(dot.contains("  \"Client\" -> \"API\";\n"));
    assert!(dot.contains("  \"API\" -> \"DB\" [label=\"sql\"];\n"));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn skips_dangling_edges_and_members() {
    let dot = build_dot(&sample(), &DotOptions::default());
    assert!(!dot.contains("Ghost"));
    assert!(!dot.contains("Missing"));
}

#[test]
fn node_in_two_layers_emitted_once() {
    let mut graph = Graph::new(vec!["A".into(), "B".into()], vec![Edge::new("A", "B")]);
    graph.layers.insert("One".into(), vec!["A".into()]);
    graph.layers.insert("Two".into(), vec!["A".into(), "B".into()]);
    let dot = build_dot(&graph, &DotOptions::default());
    assert_eq!(dot.matches("\"A\" [label=").count(), 1);
    assert_eq!(dot.matches("\"B\" [label=").count(), 1);
}

#[test]
fn escapes_quotes_and_backslashes() {
    let graph = Graph::new(vec!["say \"hi\"".into(), "C:\\tmp".into()], Vec::new());
    let dot = build_dot(&graph, &DotOptions { rankdir: RankDir::TopBottom, wrap_width: 0 });
    assert!(dot.contains("rankdir=TB;"));
    assert!(dot.contains("\"say \\\"hi\\\"\" [label=\"say \\\"hi\\\"\"];"));
    assert!(dot.contains("\"C:\\\\tmp\""));
}

#[test]
fn wraps_long_labels() {
    assert_eq!(wrap("Handles user authentication and sessions", 20), "Handles user\nauthentication and\nsessions");
    assert_eq!(wrap("Name\nshort", 20), "Name\nshort");
    assert_eq!(wrap("unbreakablewordlongerthanwidth", 5), "unbreakablewordlongerthanwidth");
    assert_eq!(wrap("no wrap", 0), "no wrap");
}

#[test]
fn rankdir_parses_case_insensitively() {
    assert_eq!("tb".parse::<RankDir>(), Ok(RankDir::TopBottom));
    assert_eq!("BT".parse::<RankDir>(), Ok(RankDir::BottomTop));
    assert!("diagonal".parse::<RankDir>().is_err());
    assert_eq!(RankDir::RightLeft.to_string(), "RL");
}

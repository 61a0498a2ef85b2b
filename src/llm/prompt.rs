//! Prompt text sent to the inference endpoint.
//!
//! The section markers requested here are what `diagram::sections` splits on.

use crate::diagram::sections::{DIAGRAM_MARKER, EXPLANATION_MARKER};

/// Which prompt a completion was made with. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Architecture,
    JsonRepair,
}

const ARCHITECTURE_BODY: &str = "\
Write a clear, structured system design (max ~700 words).
Use plain headings, short paragraphs and simple lists. No code blocks. No decorative separators.

Mandatory subsections:
1) Problem Summary
2) Functional Breakdown
3) Non-Functional Impact
4) High-Level Architecture (justification)
5) Layered Architecture View
6) Step-by-Step Data Flow (use -> arrows)
7) Component Responsibilities
8) Detailed Diagram Explanation (explain every node and every edge)
9) Scalability & Partitioning
10) Storage Strategy
11) Caching Strategy
12) Load Balancing & Traffic Management
13) Security & Compliance
14) Fault Tolerance & Recovery
15) Observability & SLOs
16) Deployment & DevOps
17) Trade-offs & Alternatives
18) Recommended Tech Stack";

const DIAGRAM_BODY: &str = "\
Return STRICT VALID JSON ONLY (only JSON, nothing else) with the keys
nodes, edges, annotations, layers, edge_types:
{\"nodes\": [\"A\", \"B\"], \"edges\": [[\"A\", \"B\"]], \"annotations\": {\"A\": \"short note\"},
 \"layers\": {\"Layer\": [\"A\"]}, \"edge_types\": {\"A->B\": \"http\"}}
3-12 components. Annotations of at most 10 words per node.
Output must end immediately after the closing brace.";

const REPAIR_SYSTEM: &str = "\
You fix malformed JSON describing an architecture diagram.
Return ONLY the corrected JSON object with keys nodes, edges, annotations, layers, edge_types.
Do not add commentary, code fences or new components.";

#[must_use]
pub fn system_prompt(kind: PromptKind) -> String {
    match kind {
        PromptKind::Architecture => format!(
            "You are a senior system architect.\n\
             Your output MUST contain EXACTLY TWO SECTIONS and NOTHING ELSE.\n\n\
             {EXPLANATION_MARKER}\n{ARCHITECTURE_BODY}\n\n{DIAGRAM_MARKER}\n{DIAGRAM_BODY}\n"
        ),
        PromptKind::JsonRepair => REPAIR_SYSTEM.to_string(),
    }
}

#[must_use]
pub fn user_prompt(kind: PromptKind, input: &str) -> String {
    match kind {
        PromptKind::Architecture => format!("USER REQUIREMENT:\n{input}"),
        PromptKind::JsonRepair => format!("Fix this JSON:\n{input}"),
    }
}

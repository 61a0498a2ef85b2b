//! Split a raw completion into its explanation and diagram sections.
//!
//! The `[EXPLANATION]` / `[DIAGRAM_JSON]` markers are a convention imposed by
//! our prompt, so every combination of present and missing markers has to be
//! handled without failing.

use std::sync::LazyLock;

use regex::Regex;

pub const EXPLANATION_MARKER: &str = "[EXPLANATION]";
pub const DIAGRAM_MARKER: &str = "[DIAGRAM_JSON]";

/// Decorative `=====` lines some models put between sections.
static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*={2,}[ \t]*$\n?").expect("separator pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub explanation: String,
    pub diagram_raw: String,
    /// `false` when the diagram section had to be guessed.
    pub diagram_marker_found: bool,
}

/// Split `raw` on the section markers.
///
/// - both markers: text between them is the explanation, text after the
///   diagram marker is the diagram.
/// - only the diagram marker: everything before it is the explanation.
/// - only the explanation marker: the text after it serves as both, and the
///   repair ladder digs the JSON block out.
/// - no markers: empty explanation, the whole text is the diagram.
#[must_use]
pub fn split_sections(raw: &str) -> ParsedDocument {
    let normalized = raw.replace("\r\n", "\n");
    let cleaned = SEPARATOR_LINE.replace_all(&normalized, "");

    if let Some(idx) = cleaned.find(DIAGRAM_MARKER) {
        let before = &cleaned[..idx];
        let explanation = match before.find(EXPLANATION_MARKER) {
            Some(exp) => &before[exp + EXPLANATION_MARKER.len()..],
            None => before,
        };
        let diagram = &cleaned[idx + DIAGRAM_MARKER.len()..];
        return ParsedDocument {
            explanation: explanation.trim().to_owned(),
            diagram_raw: diagram.trim().to_owned(),
            diagram_marker_found: true,
        };
    }

    if let Some(exp) = cleaned.find(EXPLANATION_MARKER) {
        let after = cleaned[exp + EXPLANATION_MARKER.len()..].trim();
        return ParsedDocument {
            explanation: after.to_owned(),
            diagram_raw: after.to_owned(),
            diagram_marker_found: false,
        };
    }

    ParsedDocument { explanation: String::new(), diagram_raw: cleaned.trim().to_owned(), diagram_marker_found: false }
}

#[cfg(test)]
#[path = "sections_test.rs"]
mod tests;

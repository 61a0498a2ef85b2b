//! Syntactic repair strategies for malformed diagram JSON.
//!
//! DESIGN
//! ======
//! Each strategy is a pure `&str -> String` rewrite that leaves already-valid
//! input untouched, so applying one twice is the same as applying it once.
//! The parser runs them in `LADDER` order, feeding each the previous output,
//! and stops at the first result that decodes. The order goes from
//! wrapper-stripping (never changes content) towards rewrites that guess at
//! intent. LLM-assisted repair sits behind `AssistedRepair` so tests can stub it.

use serde::Serialize;

use crate::error::SketchError;

// =============================================================================
// STRATEGIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    /// Cut commentary and code fences around the JSON object.
    StripWrapping,
    /// Truncate at the last complete element and close open brackets.
    BalanceBrackets,
    /// Quote bare identifier keys and values.
    QuoteBareTokens,
    /// Drop commas directly before `}` or `]`.
    RemoveTrailingCommas,
    /// Smart quotes and single-quoted strings to JSON double quotes.
    NormalizeQuotes,
    /// Semicolon separators to commas, repeated commas collapsed.
    FixSeparators,
}

impl RepairStrategy {
    pub const LADDER: [Self; 6] = [
        Self::StripWrapping,
        Self::BalanceBrackets,
        Self::QuoteBareTokens,
        Self::RemoveTrailingCommas,
        Self::NormalizeQuotes,
        Self::FixSeparators,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::StripWrapping => "strip_wrapping",
            Self::BalanceBrackets => "balance_brackets",
            Self::QuoteBareTokens => "quote_bare_tokens",
            Self::RemoveTrailingCommas => "remove_trailing_commas",
            Self::NormalizeQuotes => "normalize_quotes",
            Self::FixSeparators => "fix_separators",
        }
    }

    /// Position in `LADDER`.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::StripWrapping => strip_wrapping(text),
            Self::BalanceBrackets => balance_brackets(text),
            Self::QuoteBareTokens => quote_bare_tokens(text),
            Self::RemoveTrailingCommas => remove_trailing_commas(text),
            Self::NormalizeQuotes => normalize_quotes(text),
            Self::FixSeparators => fix_separators(text),
        }
    }
}

// =============================================================================
// ASSISTED REPAIR
// =============================================================================

/// Last-resort rewrite of undecodable diagram text, typically by an LLM.
///
/// Invoked at most once per parse. The returned text goes through the same
/// decode ladder as the broken input.
#[async_trait::async_trait]
pub trait AssistedRepair: Send + Sync {
    /// # Errors
    ///
    /// Any error is logged by the parser and treated as a failed repair.
    async fn repair(&self, broken: &str) -> Result<String, SketchError>;
}

// =============================================================================
// STRING TRACKING
// =============================================================================

/// Tracks whether a char stream is inside a double-quoted JSON string.
#[derive(Default)]
struct StringTracker {
    in_string: bool,
    escaped: bool,
}

impl StringTracker {
    /// Feed one char. Returns `true` when it belongs to a string literal,
    /// quotes included.
    fn step(&mut self, ch: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return true;
        }
        if ch == '"' {
            self.in_string = true;
            return true;
        }
        false
    }
}

fn closer_for(open: char) -> char {
    if open == '{' { '}' } else { ']' }
}

// =============================================================================
// (a) STRIP WRAPPING
// =============================================================================

fn strip_wrapping(text: &str) -> String {
    let scan = scan_objects(text);

    let balanced = scan
        .balanced
        .iter()
        .map(|&(start, end)| &text[start..end])
        .collect::<Vec<_>>();
    let tails = scan
        .unterminated
        .iter()
        .map(|&start| strip_trailing_fence(&text[start..]))
        .collect::<Vec<_>>();

    // Among unclosed blocks the last one mentioning nodes wins.
    let chosen = balanced
        .iter()
        .copied()
        .find(|s| s.contains("nodes"))
        .or_else(|| tails.iter().copied().rev().find(|s| s.contains("nodes")))
        .or_else(|| balanced.first().copied())
        .or_else(|| tails.first().copied());

    match chosen {
        Some(slice) => slice.to_owned(),
        None => text.to_owned(),
    }
}

struct ObjectScan {
    /// Byte ranges of `{...}` blocks that close properly.
    balanced: Vec<(usize, usize)>,
    /// Starts of `{` blocks that never close, in text order.
    unterminated: Vec<usize>,
}

fn scan_objects(text: &str) -> ObjectScan {
    let mut scan = ObjectScan { balanced: Vec::new(), unterminated: Vec::new() };
    let mut pos = 0;
    while let Some(rel) = text[pos..].find('{') {
        let start = pos + rel;
        match matching_close(text, start) {
            Some(end) => {
                scan.balanced.push((start, end));
                pos = end;
            }
            None => {
                scan.unterminated.push(start);
                pos = start + 1;
            }
        }
    }
    scan
}

/// Byte offset just past the bracket closing the one at `start`.
fn matching_close(text: &str, start: usize) -> Option<usize> {
    let mut tracker = StringTracker::default();
    let mut stack = Vec::new();
    for (offset, ch) in text[start..].char_indices() {
        if tracker.step(ch) {
            continue;
        }
        match ch {
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                let open = stack.pop()?;
                if closer_for(open) != ch {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_trailing_fence(text: &str) -> &str {
    let trimmed = text.trim_end();
    trimmed.strip_suffix("```").map_or(trimmed, str::trim_end)
}

// =============================================================================
// (b) BALANCE BRACKETS
// =============================================================================

fn balance_brackets(text: &str) -> String {
    let mut tracker = StringTracker::default();
    let mut stack: Vec<char> = Vec::new();
    // Latest point where everything before it is a complete element,
    // with the brackets still open at that point.
    let mut cut: Option<(usize, Vec<char>)> = None;

    for (idx, ch) in text.char_indices() {
        let was_in_string = tracker.in_string;
        if tracker.step(ch) {
            if was_in_string && !tracker.in_string && stack.last() == Some(&'[') {
                cut = Some((idx + 1, stack.clone()));
            }
            continue;
        }
        match ch {
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                match stack.pop() {
                    Some(open) if closer_for(open) == ch => {}
                    _ => return text.to_owned(),
                }
                cut = Some((idx + 1, stack.clone()));
            }
            ',' if !stack.is_empty() => cut = Some((idx, stack.clone())),
            _ => {}
        }
    }

    if stack.is_empty() && !tracker.in_string {
        return text.to_owned();
    }
    let Some((at, open)) = cut else {
        return text.to_owned();
    };

    let mut out = text[..at].trim_end().trim_end_matches(',').to_owned();
    for opener in open.iter().rev() {
        out.push(closer_for(*opener));
    }
    out
}

// =============================================================================
// (c) QUOTE BARE TOKENS
// =============================================================================

fn is_structural(ch: char) -> bool {
    matches!(ch, '{' | '}' | '[' | ']' | ',' | ':')
}

fn quote_bare_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut tracker = StringTracker::default();
    let mut chars = text.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if tracker.step(ch) || ch.is_whitespace() || is_structural(ch) {
            out.push(ch);
            continue;
        }
        let mut end = text.len();
        while let Some(&(idx, next)) = chars.peek() {
            if is_structural(next) || next == '"' || next == '\n' {
                end = idx;
                break;
            }
            chars.next();
        }
        push_bare(&mut out, &text[start..end]);
    }
    out
}

fn push_bare(out: &mut String, raw: &str) {
    let token = raw.trim_end();
    if !looks_like_identifier(token) {
        out.push_str(raw);
        return;
    }
    out.push('"');
    out.push_str(&token.replace('\\', "\\\\"));
    out.push('"');
    out.push_str(&raw[token.len()..]);
}

fn looks_like_identifier(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    if matches!(token, "true" | "false" | "null") {
        return false;
    }
    (first.is_alphabetic() || first == '_')
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | '/' | '&' | '(' | ')' | '+' | '#'))
}

// =============================================================================
// (d) REMOVE TRAILING COMMAS
// =============================================================================

fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();
    for (idx, ch) in text.char_indices() {
        if !tracker.step(ch) && ch == ',' && text[idx + 1..].trim_start().starts_with(['}', ']']) {
            continue;
        }
        out.push(ch);
    }
    out
}

// =============================================================================
// (e) NORMALIZE QUOTES
// =============================================================================

fn normalize_quotes(text: &str) -> String {
    let text = text
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if tracker.step(ch) || ch != '\'' {
            out.push(ch);
            continue;
        }
        let rest = chars.as_str();
        let Some(close) = rest.find('\'') else {
            out.push(ch);
            continue;
        };
        out.push('"');
        out.push_str(&rest[..close].replace('"', "\\\""));
        out.push('"');
        chars = rest[close + 1..].chars();
    }
    out
}

// =============================================================================
// (f) FIX SEPARATORS
// =============================================================================

fn fix_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();
    for ch in text.chars() {
        if tracker.step(ch) {
            out.push(ch);
            continue;
        }
        let ch = if ch == ';' { ',' } else { ch };
        if ch == ',' && matches!(out.trim_end().chars().last(), Some(',' | '[' | '{')) {
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
#[path = "repair_test.rs"]
mod tests;

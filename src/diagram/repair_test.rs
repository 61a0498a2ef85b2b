use super::*;

fn decodes(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

// ===== strip_wrapping =====

#[test]
fn strip_removes_code_fence() {
    let text = "```json\n{\"nodes\": [\"A\", \"B\"], \"edges\": []}\n```";
    let out = RepairStrategy::StripWrapping.apply(text);
    assert_eq!(out, "{\"nodes\": [\"A\", \"B\"], \"edges\": []}");
}

#[test]
fn strip_prefers_object_with_nodes() {
    let text = "Use {placeholders} freely. Here: {\"nodes\": [\"A\"]} done.";
    assert_eq!(RepairStrategy::StripWrapping.apply(text), "{\"nodes\": [\"A\"]}");
}

#[test]
fn strip_ignores_braces_inside_strings() {
    let text = "note {\"nodes\": [\"a}b\", \"c\"]} trailing";
    assert_eq!(RepairStrategy::StripWrapping.apply(text), "{\"nodes\": [\"a}b\", \"c\"]}");
}

#[test]
fn strip_keeps_unterminated_tail() {
    let text = "Here you go:\n{\"nodes\": [\"A\", \"B\"], \"edges\": [[\"A\",\"B\"]\n```";
    let out = RepairStrategy::StripWrapping.apply(text);
    assert_eq!(out, "{\"nodes\": [\"A\", \"B\"], \"edges\": [[\"A\",\"B\"]");
}

#[test]
fn strip_skips_unclosed_brace_in_prose() {
    let text = "fields like {id are omitted):\n{\"nodes\": [\"A\"]}";
    assert_eq!(RepairStrategy::StripWrapping.apply(text), "{\"nodes\": [\"A\"]}");
}

#[test]
fn strip_prefers_innermost_unterminated_tail_with_nodes() {
    let text = "a {stray note\n{\"nodes\": [\"A\", \"B\"], \"edges\": [";
    assert_eq!(RepairStrategy::StripWrapping.apply(text), "{\"nodes\": [\"A\", \"B\"], \"edges\": [");
}

#[test]
fn strip_without_braces_is_noop() {
    let text = "no json here";
    assert_eq!(RepairStrategy::StripWrapping.apply(text), text);
}

// ===== balance_brackets =====

#[test]
fn balance_closes_after_last_complete_element() {
    let text = "{\"nodes\": [\"A\",\"B\"], \"edges\": [[\"A\",\"B\"]";
    let out = RepairStrategy::BalanceBrackets.apply(text);
    assert_eq!(out, "{\"nodes\": [\"A\",\"B\"], \"edges\": [[\"A\",\"B\"]]}");
    assert!(decodes(&out));
}

#[test]
fn balance_drops_partial_member() {
    let text = "{\"nodes\": [\"A\",\"B\"], \"edges\": [[\"A\",\"B\"]], \"annotations\": {\"A\": \"lo";
    let out = RepairStrategy::BalanceBrackets.apply(text);
    assert_eq!(out, "{\"nodes\": [\"A\",\"B\"], \"edges\": [[\"A\",\"B\"]]}");
}

#[test]
fn balance_leaves_balanced_text() {
    let text = "{\"nodes\": [\"A\"]}";
    assert_eq!(RepairStrategy::BalanceBrackets.apply(text), text);
}

#[test]
fn balance_gives_up_on_mismatched_closer() {
    let text = "{\"nodes\": [\"A\"}";
    assert_eq!(RepairStrategy::BalanceBrackets.apply(text), text);
}

// ===== quote_bare_tokens =====

#[test]
fn quote_wraps_bare_identifiers() {
    let out = RepairStrategy::QuoteBareTokens.apply("{nodes: [Client, API Gateway, \"DB\"]}");
    assert_eq!(out, "{\"nodes\": [\"Client\", \"API Gateway\", \"DB\"]}");
    assert!(decodes(&out));
}

#[test]
fn quote_skips_literals_and_numbers() {
    let text = "{\"a\": true, \"b\": null, \"c\": 42, \"d\": false}";
    assert_eq!(RepairStrategy::QuoteBareTokens.apply(text), text);
}

#[test]
fn quote_leaves_string_contents_alone() {
    let text = "{\"nodes\": [\"has, commas: inside\"]}";
    assert_eq!(RepairStrategy::QuoteBareTokens.apply(text), text);
}

// ===== remove_trailing_commas =====

#[test]
fn trailing_commas_removed() {
    let out = RepairStrategy::RemoveTrailingCommas.apply("{\"nodes\": [\"A\", \"B\",], \"edges\": [] ,\n}");
    assert_eq!(out, "{\"nodes\": [\"A\", \"B\"], \"edges\": [] \n}");
    assert!(decodes(&out));
}

#[test]
fn trailing_comma_inside_string_kept() {
    let text = "{\"nodes\": [\"A,]\"]}";
    assert_eq!(RepairStrategy::RemoveTrailingCommas.apply(text), text);
}

// ===== normalize_quotes =====

#[test]
fn single_quotes_become_double() {
    let out = RepairStrategy::NormalizeQuotes.apply("{'nodes': ['A', 'B']}");
    assert_eq!(out, "{\"nodes\": [\"A\", \"B\"]}");
}

#[test]
fn smart_quotes_become_double() {
    let out = RepairStrategy::NormalizeQuotes.apply("{\u{201C}nodes\u{201D}: [\u{201C}A\u{201D}]}");
    assert_eq!(out, "{\"nodes\": [\"A\"]}");
}

#[test]
fn apostrophes_inside_double_quotes_kept() {
    let text = "{\"nodes\": [\"User's phone\"]}";
    assert_eq!(RepairStrategy::NormalizeQuotes.apply(text), text);
}

// ===== fix_separators =====

#[test]
fn semicolons_become_commas() {
    let out = RepairStrategy::FixSeparators.apply("{\"nodes\": [\"A\"; \"B\"]; \"edges\": []}");
    assert_eq!(out, "{\"nodes\": [\"A\", \"B\"], \"edges\": []}");
}

#[test]
fn repeated_and_leading_commas_collapse() {
    let out = RepairStrategy::FixSeparators.apply("{\"nodes\": [, \"A\",, \"B\"]}");
    assert_eq!(out, "{\"nodes\": [ \"A\", \"B\"]}");
    assert!(decodes(&out));
}

// ===== ladder =====

#[test]
fn every_strategy_is_idempotent_on_valid_json() {
    let valid = "{\"nodes\": [\"A\", \"B\"], \"edges\": [[\"A\", \"B\"]], \"annotations\": {\"A\": \"x; y\"}}";
    for strategy in RepairStrategy::LADDER {
        assert_eq!(strategy.apply(valid), valid, "{} changed valid input", strategy.name());
    }
}

#[test]
fn ladder_order_and_names() {
    let names: Vec<_> = RepairStrategy::LADDER.iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        ["strip_wrapping", "balance_brackets", "quote_bare_tokens", "remove_trailing_commas", "normalize_quotes", "fix_separators"]
    );
    for (idx, strategy) in RepairStrategy::LADDER.iter().enumerate() {
        assert_eq!(strategy.index(), idx);
    }
}

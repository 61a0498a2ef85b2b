use super::*;
use crate::diagram::validate::Violation;

// =============================================================================
// error_code
// =============================================================================

#[test]
fn error_code_configuration() {
    let err = SketchError::Configuration { message: "GROQ_API_KEY missing".into() };
    assert_eq!(err.error_code(), "E_CONFIGURATION");
    assert!(!err.retryable());
}

#[test]
fn error_code_validation() {
    let err = SketchError::invalid_input("requirement is empty");
    assert_eq!(err.error_code(), "E_VALIDATION");
    assert!(err.violations().is_empty());
}

#[test]
fn error_code_parse_keeps_raw_text() {
    let err = SketchError::Parse { raw: "{nope".into(), attempted: vec!["strip_wrapping".into()] };
    assert_eq!(err.error_code(), "E_PARSE");
    assert_eq!(err.raw_text(), Some("{nope"));
    assert!(err.to_string().contains("strip_wrapping"));
}

// =============================================================================
// retryable
// =============================================================================

#[test]
fn upstream_server_errors_are_retryable() {
    let err = SketchError::Upstream { service: Service::Render, attempts: 3, status: Some(503), last_error: "x".into() };
    assert!(err.retryable());
}

#[test]
fn upstream_rate_limit_is_retryable() {
    let err =
        SketchError::Upstream { service: Service::Inference, attempts: 3, status: Some(429), last_error: "x".into() };
    assert!(err.retryable());
}

#[test]
fn upstream_client_errors_are_not_retryable() {
    let err = SketchError::Upstream { service: Service::Render, attempts: 1, status: Some(400), last_error: "x".into() };
    assert!(!err.retryable());
}

#[test]
fn timeout_is_retryable() {
    let err = SketchError::Timeout { service: Service::Render, attempts: 2, timeout_secs: 30 };
    assert!(err.retryable());
    assert!(err.to_string().contains("render service"));
}

#[test]
fn validation_exposes_violations() {
    let err = SketchError::Validation {
        message: "1 structural violation".into(),
        violations: vec![Violation::NodeCount { count: 1, min: 2, max: 20 }],
    };
    assert_eq!(err.violations().len(), 1);
}

// =============================================================================
// details
// =============================================================================

#[test]
fn details_list_every_violation() {
    let err = SketchError::Validation {
        message: "2 structural violations".into(),
        violations: vec![
            Violation::NodeCount { count: 1, min: 2, max: 20 },
            Violation::NodeCount { count: 25, min: 2, max: 20 },
        ],
    };
    let details = err.details().unwrap();
    assert_eq!(details.lines().count(), 2);
    assert!(details.lines().all(|line| line.starts_with("- NodeCountViolation: ")));
}

#[test]
fn details_carry_raw_parse_text() {
    let err = SketchError::Parse { raw: "[DIAGRAM_JSON]\n{nope".into(), attempted: Vec::new() };
    let details = err.details().unwrap();
    assert!(details.ends_with("[DIAGRAM_JSON]\n{nope"));
}

#[test]
fn details_absent_without_payload() {
    assert!(SketchError::invalid_input("requirement is empty").details().is_none());
    assert!(SketchError::Configuration { message: "missing key".into() }.details().is_none());
}

//! Error taxonomy shared by every component.
//!
//! DESIGN
//! ======
//! One enum for everything a caller can see. Transport failures never leak
//! out directly: the clients classify them, retry what is transient, and only
//! then escalate to `Upstream` or `Timeout`. Each variant keeps the payload a
//! debugging view needs (raw text, violations, attempt count).

use std::fmt;

use crate::diagram::validate::Violation;

// =============================================================================
// SERVICE
// =============================================================================

/// External collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Inference,
    Render,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inference => f.write_str("inference service"),
            Self::Render => f.write_str("render service"),
        }
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SketchError {
    /// Missing or rejected credential, or an unusable config value.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Malformed input to a component, or a strict graph validation failure.
    #[error("validation failed: {message}")]
    Validation { message: String, violations: Vec<Violation> },

    /// An external service could not produce a result.
    #[error("{service} unavailable after {attempts} attempt(s): {last_error}")]
    Upstream { service: Service, attempts: u32, status: Option<u16>, last_error: String },

    /// The final attempt against an external service exceeded its deadline.
    #[error("{service} timed out after {attempts} attempt(s) ({timeout_secs}s per attempt)")]
    Timeout { service: Service, attempts: u32, timeout_secs: u64 },

    /// Diagram content stayed undecodable after the whole repair ladder.
    #[error("could not decode diagram JSON (tried: {})", .attempted.join(", "))]
    Parse { raw: String, attempted: Vec<String> },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl SketchError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), violations: Vec::new() }
    }

    /// Violations attached to a strict validation failure, if any.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Raw diagram text attached to a parse failure.
    #[must_use]
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Multi-line view of the attached payload for a failure report: one
    /// line per violation, or the raw text behind a parse failure.
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Validation { violations, .. } if !violations.is_empty() => Some(
                violations
                    .iter()
                    .map(|violation| format!("- {}: {violation}", violation.kind()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Self::Parse { raw, .. } => Some(format!("raw completion:\n{raw}")),
            _ => None,
        }
    }
}

// =============================================================================
// ERROR CODE
// =============================================================================

/// Grepable error code and retryable flag for user-facing error views.
pub trait ErrorCode: fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

impl ErrorCode for SketchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "E_CONFIGURATION",
            Self::Validation { .. } => "E_VALIDATION",
            Self::Upstream { .. } => "E_UPSTREAM",
            Self::Timeout { .. } => "E_TIMEOUT",
            Self::Parse { .. } => "E_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Upstream { status, .. } => !matches!(status, Some(s) if (400..500).contains(s) && *s != 429),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

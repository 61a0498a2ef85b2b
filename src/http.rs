//! Transport-level failures shared by the two outbound clients.

use crate::retry::ErrorClass;

/// What went wrong on a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpFailure {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {}", truncate(.body, 200))]
    Status { status: u16, body: String },

    /// Connection, TLS or I/O failure before a status arrived.
    #[error("request failed: {0}")]
    Transport(String),

    /// The attempt did not finish within its deadline.
    #[error("request timed out")]
    Timeout,

    /// A success status with an unusable body.
    #[error("unusable response body: {0}")]
    Body(String),
}

impl HttpFailure {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() { Self::Timeout } else { Self::Transport(error.to_string()) }
    }
}

/// Default classification: rate limits and 5xx are worth retrying, other 4xx are not.
#[must_use]
pub fn classify(failure: &HttpFailure) -> ErrorClass {
    match failure {
        HttpFailure::Status { status: 429, .. } => ErrorClass::RateLimited,
        HttpFailure::Status { status: 408 | 500..=599, .. } => ErrorClass::Transient,
        HttpFailure::Status { .. } => ErrorClass::Permanent,
        HttpFailure::Timeout => ErrorClass::Timeout,
        HttpFailure::Transport(_) | HttpFailure::Body(_) => ErrorClass::Transient,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

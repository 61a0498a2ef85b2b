//! Provider-neutral request/response types and the transport seam.

use crate::http::HttpFailure;

/// One chat-style completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub finish_reason: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A single HTTP round trip to an inference endpoint.
///
/// Implementations do not retry. The completion client owns retries,
/// caching and the credential check.
#[async_trait::async_trait]
pub trait CompletionTransport: Send + Sync {
    /// # Errors
    ///
    /// Any transport, status or body failure of this one attempt.
    async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<CompletionResponse, HttpFailure>;
}

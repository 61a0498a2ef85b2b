//! OpenAI-compatible `/chat/completions` transport.
//!
//! Groq, `OpenAI` and most hosted Llama endpoints speak this shape. One call
//! here is one HTTP attempt.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::types::{CompletionRequest, CompletionResponse, CompletionTransport};
use crate::error::SketchError;
use crate::http::HttpFailure;

pub struct OpenAiCompatTransport {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatTransport {
    /// # Errors
    ///
    /// Returns `SketchError::HttpClientBuild` if the reqwest client fails to build.
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, SketchError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SketchError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn send_json(&self, api_key: &str, path: &str, body: &impl Serialize) -> Result<String, HttpFailure> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(HttpFailure::from_reqwest)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(HttpFailure::from_reqwest)?;
        if status != 200 {
            return Err(HttpFailure::Status { status, body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl CompletionTransport for OpenAiCompatTransport {
    async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<CompletionResponse, HttpFailure> {
        let messages = build_messages(request);
        let body = CcRequest {
            model: &request.model,
            messages: &messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };
        let text = self.send_json(api_key, "/chat/completions", &body).await?;
        parse_chat_completions_response(&text)
    }
}

// =============================================================================
// CHAT COMPLETIONS WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    messages: &'a [CcMessage<'a>],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct CcMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn build_messages(request: &CompletionRequest) -> Vec<CcMessage<'_>> {
    let mut out = Vec::with_capacity(2);
    if !request.system.trim().is_empty() {
        out.push(CcMessage { role: "system", content: &request.system });
    }
    out.push(CcMessage { role: "user", content: &request.user });
    out
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

pub(crate) fn parse_chat_completions_response(json_text: &str) -> Result<CompletionResponse, HttpFailure> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| HttpFailure::Body(e.to_string()))?;
    let model = root
        .get("model")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default();
    let usage = |field: &str| {
        root.get("usage")
            .and_then(|u| u.get(field))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(HttpFailure::Body("chat_completions: missing choices[0]".to_string()));
    };
    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();

    // Some compatible servers put the text on the choice, not the message.
    let text = choice
        .get("message")
        .and_then(|m| m.get("content").or_else(|| m.get("text")))
        .or_else(|| choice.get("text"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(HttpFailure::Body("chat_completions: empty content".to_string()));
    }

    Ok(CompletionResponse {
        text: text.to_string(),
        model,
        finish_reason,
        prompt_tokens: usage("prompt_tokens"),
        completion_tokens: usage("completion_tokens"),
    })
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;

//! Completion client: requirement text to raw model output.
//!
//! DESIGN
//! ======
//! The client validates input, consults the LRU cache, checks the
//! credential, then runs the transport under the shared retry loop. The
//! transport is a trait object so tests can count network calls and script
//! failures. Cache lookup comes before the credential check: a cached answer
//! is served even when no key is configured.

pub mod openai;
pub mod prompt;
pub mod types;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, LruCache};
use crate::config::{BackoffSettings, LlmSettings};
use crate::diagram::repair::AssistedRepair;
use crate::error::{Service, SketchError};
use crate::http::{self, HttpFailure};
use crate::retry::{self, ErrorClass, RetryFailure};
pub use prompt::PromptKind;
use types::{CompletionRequest, CompletionTransport};

/// Architecture answers shorter than this are treated as a failed attempt.
pub const MIN_RESPONSE_CHARS: usize = 50;

const TOP_P: f32 = 0.9;

pub type CompletionCache = LruCache<CompletionKey, String>;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    /// Total attempt budget.
    pub max_retries: u32,
    pub use_cache: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub text: String,
    pub cached: bool,
    /// Network attempts made. Zero for a cache hit.
    pub attempts: u32,
}

/// Exact parameter tuple a cached completion was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompletionKey {
    kind: PromptKind,
    input: String,
    model: String,
    temperature_bits: u32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub cache: CacheStats,
    pub network_calls: u64,
    pub retries: u64,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    cache: Arc<CompletionCache>,
    api_key: Option<String>,
    api_key_var: String,
    defaults: CompletionParams,
    max_requirement_chars: usize,
    request_timeout_secs: u64,
    backoff: BackoffSettings,
    network_calls: AtomicU64,
    retries: AtomicU64,
}

impl CompletionClient {
    /// Build a client backed by the OpenAI-compatible HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_settings(
        settings: &LlmSettings,
        backoff: BackoffSettings,
        cache: Arc<CompletionCache>,
    ) -> Result<Self, SketchError> {
        let transport = openai::OpenAiCompatTransport::new(
            &settings.base_url,
            Duration::from_secs(settings.request_timeout_secs),
            Duration::from_secs(settings.connect_timeout_secs),
        )?;
        Ok(Self::with_transport(Arc::new(transport), settings, backoff, cache))
    }

    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn CompletionTransport>,
        settings: &LlmSettings,
        backoff: BackoffSettings,
        cache: Arc<CompletionCache>,
    ) -> Self {
        Self {
            transport,
            cache,
            api_key: settings.api_key.clone(),
            api_key_var: settings.api_key_var.clone(),
            defaults: CompletionParams {
                model: settings.model.clone(),
                max_retries: settings.max_retries,
                use_cache: true,
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            },
            max_requirement_chars: settings.max_requirement_chars,
            request_timeout_secs: settings.request_timeout_secs,
            backoff,
            network_calls: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Parameters from configuration, with caching on.
    #[must_use]
    pub fn default_params(&self) -> CompletionParams {
        self.defaults.clone()
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate the explanation + diagram answer for `requirement`.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty or oversized requirement.
    /// - `Configuration` when no credential is set or it is rejected.
    /// - `Upstream` / `Timeout` once the attempt budget is spent.
    pub async fn complete(&self, requirement: &str, params: &CompletionParams) -> Result<CompletionResult, SketchError> {
        self.run(PromptKind::Architecture, requirement, params).await
    }

    /// Ask the model to return corrected diagram JSON, at temperature zero.
    ///
    /// # Errors
    ///
    /// Same as [`CompletionClient::complete`].
    pub async fn repair_json(&self, broken: &str) -> Result<CompletionResult, SketchError> {
        let params = CompletionParams { temperature: 0.0, ..self.default_params() };
        self.run(PromptKind::JsonRepair, broken, &params).await
    }

    #[must_use]
    pub fn stats(&self) -> CompletionStats {
        CompletionStats {
            cache: self.cache.stats(),
            network_calls: self.network_calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("llm: completion cache cleared");
    }

    pub fn reset_stats(&self) {
        self.cache.reset_stats();
        self.network_calls.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
    }

    async fn run(&self, kind: PromptKind, input: &str, params: &CompletionParams) -> Result<CompletionResult, SketchError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SketchError::invalid_input("requirement must not be empty"));
        }
        let chars = input.chars().count();
        if kind == PromptKind::Architecture && chars > self.max_requirement_chars {
            return Err(SketchError::invalid_input(format!(
                "requirement is {chars} chars; the limit is {}",
                self.max_requirement_chars
            )));
        }

        let key = CompletionKey {
            kind,
            input: input.to_string(),
            model: params.model.clone(),
            temperature_bits: params.temperature.to_bits(),
            max_tokens: params.max_tokens,
        };
        if params.use_cache {
            if let Some(text) = self.cache.get(&key) {
                info!(cache = "hit", ?kind, model = %params.model, "llm: serving cached completion");
                return Ok(CompletionResult { text, cached: true, attempts: 0 });
            }
            debug!(cache = "miss", ?kind, "llm: completion not cached");
        }

        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SketchError::Configuration {
                message: format!("{} is not set; export it or add it to .env", self.api_key_var),
            });
        };

        let request = CompletionRequest {
            model: params.model.clone(),
            system: prompt::system_prompt(kind),
            user: prompt::user_prompt(kind, input),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: TOP_P,
        };
        let min_chars = if kind == PromptKind::Architecture { MIN_RESPONSE_CHARS } else { 1 };
        let policy = self.backoff.policy(params.max_retries);

        let outcome = retry::retry("llm.complete", policy, classify_inference, |attempt| {
            let request = &request;
            async move {
                self.network_calls.fetch_add(1, Ordering::Relaxed);
                debug!(attempt, model = %request.model, "llm: calling inference endpoint");
                let response = self.transport.complete(api_key, request).await?;
                let len = response.text.chars().count();
                if len < min_chars {
                    return Err(HttpFailure::Body(format!("response too short ({len} chars)")));
                }
                Ok(response)
            }
        })
        .await;

        match outcome {
            Ok(done) => {
                self.retries.fetch_add(u64::from(done.retries()), Ordering::Relaxed);
                let attempts = done.attempts;
                let response = done.value;
                info!(
                    attempts,
                    chars = response.text.len(),
                    prompt_tokens = response.prompt_tokens,
                    completion_tokens = response.completion_tokens,
                    "llm: completion received"
                );
                if params.use_cache {
                    self.cache.insert(key, response.text.clone());
                }
                Ok(CompletionResult { text: response.text, cached: false, attempts })
            }
            Err(failure) => {
                self.retries.fetch_add(u64::from(failure.retries()), Ordering::Relaxed);
                Err(self.escalate(failure))
            }
        }
    }

    fn escalate(&self, failure: RetryFailure<HttpFailure>) -> SketchError {
        let RetryFailure { error, attempts, exhausted, .. } = failure;
        match error {
            HttpFailure::Status { status: status @ (401 | 403), .. } => {
                warn!(status, "llm: credential rejected");
                SketchError::Configuration {
                    message: format!("inference credential rejected (HTTP {status}); check {}", self.api_key_var),
                }
            }
            HttpFailure::Timeout if exhausted => SketchError::Timeout {
                service: Service::Inference,
                attempts,
                timeout_secs: self.request_timeout_secs,
            },
            other => SketchError::Upstream {
                service: Service::Inference,
                attempts,
                status: other.status(),
                last_error: other.to_string(),
            },
        }
    }
}

/// Rejected credentials never recover on retry.
fn classify_inference(failure: &HttpFailure) -> ErrorClass {
    match failure {
        HttpFailure::Status { status: 401 | 403, .. } => ErrorClass::Permanent,
        other => http::classify(other),
    }
}

// =============================================================================
// ASSISTED REPAIR
// =============================================================================

/// Routes the parser's assisted repair through the completion client.
pub struct LlmRepair {
    client: Arc<CompletionClient>,
}

impl LlmRepair {
    #[must_use]
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl AssistedRepair for LlmRepair {
    async fn repair(&self, broken: &str) -> Result<String, SketchError> {
        Ok(self.client.repair_json(broken).await?.text)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

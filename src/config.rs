//! Settings parsed from environment variables.
//!
//! The inference credential is optional here: its absence only becomes an
//! error when the completion client is asked to make a network call.

use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.15;
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 1400;
pub const DEFAULT_LLM_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REQUIREMENT_CHARS: usize = 4000;

pub const DEFAULT_RENDER_BASE_URL: &str = "https://kroki.io";
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RENDER_MAX_RETRIES: u32 = 3;

pub const DEFAULT_COMPLETION_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_RENDER_CACHE_CAPACITY: usize = 50;

pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;
pub const DEFAULT_RETRY_MAX_MS: u64 = 8000;
pub const DEFAULT_RETRY_JITTER_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    /// Name of the env var the credential was read from.
    pub api_key_var: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_requirement_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub completion_capacity: usize,
    pub render_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSettings {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter_ms: u64,
}

impl BackoffSettings {
    /// Retry policy with this backoff shape and the given attempt budget.
    #[must_use]
    pub fn policy(self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(self.base_ms),
            max_delay: Duration::from_millis(self.max_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SketchConfig {
    pub llm: LlmSettings,
    pub render: RenderSettings,
    pub cache: CacheSettings,
    pub backoff: BackoffSettings,
}

impl SketchConfig {
    /// Build typed config from environment variables.
    ///
    /// All variables are optional:
    /// - `SKETCH_API_KEY_ENV`: names the env var holding the key (default `GROQ_API_KEY`)
    /// - `SKETCH_LLM_BASE_URL`, `SKETCH_LLM_MODEL`, `SKETCH_LLM_TEMPERATURE`,
    ///   `SKETCH_LLM_MAX_TOKENS`, `SKETCH_LLM_MAX_RETRIES`
    /// - `SKETCH_LLM_REQUEST_TIMEOUT_SECS`, `SKETCH_LLM_CONNECT_TIMEOUT_SECS`
    /// - `SKETCH_MAX_REQUIREMENT_CHARS`
    /// - `SKETCH_RENDER_BASE_URL`, `SKETCH_RENDER_TIMEOUT_SECS`, `SKETCH_RENDER_MAX_RETRIES`
    /// - `SKETCH_COMPLETION_CACHE_CAPACITY`, `SKETCH_RENDER_CACHE_CAPACITY`
    /// - `SKETCH_RETRY_BASE_MS`, `SKETCH_RETRY_MAX_MS`, `SKETCH_RETRY_JITTER_MS`
    ///
    /// Unparseable numbers fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let api_key_var = std::env::var("SKETCH_API_KEY_ENV").unwrap_or_else(|_| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&api_key_var)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let llm = LlmSettings {
            api_key,
            api_key_var,
            base_url: env_url("SKETCH_LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            model: std::env::var("SKETCH_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            temperature: env_parse("SKETCH_LLM_TEMPERATURE", DEFAULT_LLM_TEMPERATURE),
            max_tokens: env_parse("SKETCH_LLM_MAX_TOKENS", DEFAULT_LLM_MAX_TOKENS),
            max_retries: env_parse("SKETCH_LLM_MAX_RETRIES", DEFAULT_LLM_MAX_RETRIES),
            request_timeout_secs: env_parse("SKETCH_LLM_REQUEST_TIMEOUT_SECS", DEFAULT_LLM_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: env_parse("SKETCH_LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
            max_requirement_chars: env_parse("SKETCH_MAX_REQUIREMENT_CHARS", DEFAULT_MAX_REQUIREMENT_CHARS),
        };
        let render = RenderSettings {
            base_url: env_url("SKETCH_RENDER_BASE_URL", DEFAULT_RENDER_BASE_URL),
            timeout_secs: env_parse("SKETCH_RENDER_TIMEOUT_SECS", DEFAULT_RENDER_TIMEOUT_SECS),
            max_retries: env_parse("SKETCH_RENDER_MAX_RETRIES", DEFAULT_RENDER_MAX_RETRIES),
        };
        let cache = CacheSettings {
            completion_capacity: env_parse("SKETCH_COMPLETION_CACHE_CAPACITY", DEFAULT_COMPLETION_CACHE_CAPACITY),
            render_capacity: env_parse("SKETCH_RENDER_CACHE_CAPACITY", DEFAULT_RENDER_CACHE_CAPACITY),
        };
        let backoff = BackoffSettings {
            base_ms: env_parse("SKETCH_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS),
            max_ms: env_parse("SKETCH_RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS),
            jitter_ms: env_parse("SKETCH_RETRY_JITTER_MS", DEFAULT_RETRY_JITTER_MS),
        };

        Self { llm, render, cache, backoff }
    }
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings {
                api_key_var: DEFAULT_API_KEY_ENV.to_string(),
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
                temperature: DEFAULT_LLM_TEMPERATURE,
                max_tokens: DEFAULT_LLM_MAX_TOKENS,
                max_retries: DEFAULT_LLM_MAX_RETRIES,
                request_timeout_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS,
                connect_timeout_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS,
                max_requirement_chars: DEFAULT_MAX_REQUIREMENT_CHARS,
            },
            render: RenderSettings {
                base_url: DEFAULT_RENDER_BASE_URL.to_string(),
                timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
                max_retries: DEFAULT_RENDER_MAX_RETRIES,
            },
            cache: CacheSettings {
                completion_capacity: DEFAULT_COMPLETION_CACHE_CAPACITY,
                render_capacity: DEFAULT_RENDER_CACHE_CAPACITY,
            },
            backoff: BackoffSettings {
                base_ms: DEFAULT_RETRY_BASE_MS,
                max_ms: DEFAULT_RETRY_MAX_MS,
                jitter_ms: DEFAULT_RETRY_JITTER_MS,
            },
        }
    }
}

fn env_url(key: &str, default: &str) -> String {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "SKETCH_API_KEY_ENV",
    "SKETCH_LLM_BASE_URL",
    "SKETCH_LLM_MODEL",
    "SKETCH_LLM_TEMPERATURE",
    "SKETCH_LLM_MAX_TOKENS",
    "SKETCH_LLM_MAX_RETRIES",
    "SKETCH_LLM_REQUEST_TIMEOUT_SECS",
    "SKETCH_LLM_CONNECT_TIMEOUT_SECS",
    "SKETCH_MAX_REQUIREMENT_CHARS",
    "SKETCH_RENDER_BASE_URL",
    "SKETCH_RENDER_TIMEOUT_SECS",
    "SKETCH_RENDER_MAX_RETRIES",
    "SKETCH_COMPLETION_CACHE_CAPACITY",
    "SKETCH_RENDER_CACHE_CAPACITY",
    "SKETCH_RETRY_BASE_MS",
    "SKETCH_RETRY_MAX_MS",
    "SKETCH_RETRY_JITTER_MS",
    "GROQ_API_KEY",
    "SKETCH_TEST_KEY",
];

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module touches the env.
unsafe fn clear_sketch_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_sketch_env() };

    let cfg = SketchConfig::from_env();
    assert_eq!(cfg, SketchConfig::default());
    assert_eq!(cfg.llm.api_key, None);
    assert_eq!(cfg.llm.api_key_var, "GROQ_API_KEY");
    assert_eq!(cfg.llm.model, DEFAULT_LLM_MODEL);
    assert_eq!(cfg.render.base_url, "https://kroki.io");
    assert_eq!(cfg.cache.completion_capacity, 100);
    assert_eq!(cfg.cache.render_capacity, 50);
}

#[test]
fn from_env_reads_indirect_api_key() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_API_KEY_ENV", "SKETCH_TEST_KEY");
        std::env::set_var("SKETCH_TEST_KEY", "  gsk_secret  ");
    }

    let cfg = SketchConfig::from_env();
    assert_eq!(cfg.llm.api_key_var, "SKETCH_TEST_KEY");
    assert_eq!(cfg.llm.api_key.as_deref(), Some("gsk_secret"));

    unsafe { clear_sketch_env() };
}

#[test]
fn from_env_blank_api_key_is_absent() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_sketch_env();
        std::env::set_var("GROQ_API_KEY", "   ");
    }

    assert_eq!(SketchConfig::from_env().llm.api_key, None);

    unsafe { clear_sketch_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_LLM_BASE_URL", "https://llm.example.test/v1/");
        std::env::set_var("SKETCH_LLM_MODEL", "llama-3.3-70b-versatile");
        std::env::set_var("SKETCH_LLM_TEMPERATURE", "0.4");
        std::env::set_var("SKETCH_LLM_MAX_RETRIES", "5");
        std::env::set_var("SKETCH_RENDER_BASE_URL", "http://localhost:8000/");
        std::env::set_var("SKETCH_RENDER_TIMEOUT_SECS", "7");
        std::env::set_var("SKETCH_RENDER_CACHE_CAPACITY", "3");
        std::env::set_var("SKETCH_RETRY_BASE_MS", "10");
    }

    let cfg = SketchConfig::from_env();
    assert_eq!(cfg.llm.base_url, "https://llm.example.test/v1");
    assert_eq!(cfg.llm.model, "llama-3.3-70b-versatile");
    assert!((cfg.llm.temperature - 0.4).abs() < f32::EPSILON);
    assert_eq!(cfg.llm.max_retries, 5);
    assert_eq!(cfg.render.base_url, "http://localhost:8000");
    assert_eq!(cfg.render.timeout_secs, 7);
    assert_eq!(cfg.cache.render_capacity, 3);
    assert_eq!(cfg.backoff.base_ms, 10);

    unsafe { clear_sketch_env() };
}

#[test]
fn from_env_bad_numbers_fall_back() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_LLM_MAX_TOKENS", "lots");
        std::env::set_var("SKETCH_RENDER_MAX_RETRIES", "-1");
    }

    let cfg = SketchConfig::from_env();
    assert_eq!(cfg.llm.max_tokens, DEFAULT_LLM_MAX_TOKENS);
    assert_eq!(cfg.render.max_retries, DEFAULT_RENDER_MAX_RETRIES);

    unsafe { clear_sketch_env() };
}

#[test]
fn backoff_policy_uses_millis() {
    let backoff = BackoffSettings { base_ms: 100, max_ms: 400, jitter_ms: 0 };
    let policy = backoff.policy(4);
    assert_eq!(policy.max_attempts, 4);
    assert_eq!(policy.base_delay, Duration::from_millis(100));
    assert_eq!(policy.max_delay, Duration::from_millis(400));
    assert_eq!(policy.jitter, Duration::ZERO);
}

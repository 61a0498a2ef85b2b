//! Render client: diagram source text to image bytes.
//!
//! DESIGN
//! ======
//! Mirrors the completion client: validate, cache lookup keyed by a SHA-256
//! of (type, format, source), then the transport under the shared retry loop.
//! Rendered bytes are stored as `Arc<[u8]>` so cache hits do not copy images.
//! `test_connection` bypasses both cache and retry so a caller can fail fast
//! when the service is down.

pub mod kroki;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, LruCache};
use crate::config::{BackoffSettings, RenderSettings};
use crate::error::{Service, SketchError};
use crate::http::{self, HttpFailure};
use crate::retry::{self, RetryFailure};

/// Successful bodies smaller than this are treated as a failed attempt.
pub const MIN_IMAGE_BYTES: usize = 100;

const PROBE_SOURCE: &str = "digraph { A -> B; }";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type RenderCache = LruCache<RenderKey, Arc<[u8]>>;

// =============================================================================
// DIAGRAM TYPE / FORMAT
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    #[default]
    Graphviz,
    PlantUml,
    Mermaid,
}

impl DiagramType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graphviz => "graphviz",
            Self::PlantUml => "plantuml",
            Self::Mermaid => "mermaid",
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graphviz" | "dot" => Ok(Self::Graphviz),
            "plantuml" => Ok(Self::PlantUml),
            "mermaid" => Ok(Self::Mermaid),
            other => Err(format!("unsupported diagram type: {other} (expected graphviz, plantuml or mermaid)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub const ALL: [Self; 3] = [Self::Png, Self::Svg, Self::Pdf];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|format| format.as_str() == wanted).ok_or_else(|| {
            let known = Self::ALL.map(Self::as_str).join(", ");
            format!("unsupported image format: {wanted} (expected one of {known})")
        })
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// A single POST to a rendering service. No retries, no caching.
#[async_trait::async_trait]
pub trait RenderTransport: Send + Sync {
    /// # Errors
    ///
    /// Any transport or status failure of this one attempt.
    async fn post(
        &self,
        diagram_type: DiagramType,
        format: ImageFormat,
        source: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpFailure>;
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub diagram_type: DiagramType,
    pub format: ImageFormat,
    /// Total attempt budget.
    pub max_retries: u32,
    /// Per-attempt deadline.
    pub timeout_secs: u64,
    pub use_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub bytes: Arc<[u8]>,
    pub format: ImageFormat,
    pub cached: bool,
    /// Network attempts made. Zero for a cache hit.
    pub attempts: u32,
}

/// SHA-256 of diagram type, format and source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderKey([u8; 32]);

impl RenderKey {
    #[must_use]
    pub fn new(diagram_type: DiagramType, format: ImageFormat, source: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(diagram_type.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(format.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(source.as_bytes());
        Self(hasher.finalize().into())
    }

    /// First eight hex digits, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub cache: CacheStats,
    pub network_calls: u64,
    pub retries: u64,
    pub cached_bytes: usize,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct RenderClient {
    transport: Arc<dyn RenderTransport>,
    cache: Arc<RenderCache>,
    settings: RenderSettings,
    backoff: BackoffSettings,
    network_calls: AtomicU64,
    retries: AtomicU64,
}

impl RenderClient {
    /// Build a client backed by the Kroki HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_settings(
        settings: &RenderSettings,
        backoff: BackoffSettings,
        cache: Arc<RenderCache>,
    ) -> Result<Self, SketchError> {
        let transport = kroki::KrokiTransport::new(&settings.base_url, CONNECT_TIMEOUT)?;
        Ok(Self::with_transport(Arc::new(transport), settings, backoff, cache))
    }

    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn RenderTransport>,
        settings: &RenderSettings,
        backoff: BackoffSettings,
        cache: Arc<RenderCache>,
    ) -> Self {
        Self {
            transport,
            cache,
            settings: settings.clone(),
            backoff,
            network_calls: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Graphviz options for `format` from configuration, with caching on.
    #[must_use]
    pub fn default_options(&self, format: ImageFormat) -> RenderOptions {
        RenderOptions {
            diagram_type: DiagramType::Graphviz,
            format,
            max_retries: self.settings.max_retries,
            timeout_secs: self.settings.timeout_secs,
            use_cache: true,
        }
    }

    /// Render `source` to an image.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty source.
    /// - `Timeout` when the last attempt ran past `timeout_secs`.
    /// - `Upstream` for a permanent failure or an exhausted budget.
    pub async fn render(&self, source: &str, options: &RenderOptions) -> Result<RenderResult, SketchError> {
        if source.trim().is_empty() {
            return Err(SketchError::invalid_input("diagram source must not be empty"));
        }

        let key = RenderKey::new(options.diagram_type, options.format, source);
        if options.use_cache {
            if let Some(bytes) = self.cache.get(&key) {
                info!(cache = "hit", key = %key.short(), format = %options.format, "render: serving cached image");
                return Ok(RenderResult { bytes, format: options.format, cached: true, attempts: 0 });
            }
            debug!(cache = "miss", key = %key.short(), "render: image not cached");
        }

        let timeout = Duration::from_secs(options.timeout_secs);
        let policy = self.backoff.policy(options.max_retries);
        info!(
            diagram_type = %options.diagram_type,
            format = %options.format,
            bytes = source.len(),
            "render: requesting image"
        );

        let outcome = retry::retry("render", policy, http::classify, |attempt| async move {
            self.network_calls.fetch_add(1, Ordering::Relaxed);
            debug!(attempt, "render: posting diagram source");
            let body = self
                .transport
                .post(options.diagram_type, options.format, source, timeout)
                .await?;
            if body.len() < MIN_IMAGE_BYTES {
                return Err(HttpFailure::Body(format!("response suspiciously small ({} bytes)", body.len())));
            }
            Ok(body)
        })
        .await;

        match outcome {
            Ok(done) => {
                self.retries.fetch_add(u64::from(done.retries()), Ordering::Relaxed);
                let bytes: Arc<[u8]> = done.value.into();
                info!(bytes = bytes.len(), attempts = done.attempts, "render: image received");
                if options.use_cache {
                    self.cache.insert(key, Arc::clone(&bytes));
                }
                Ok(RenderResult { bytes, format: options.format, cached: false, attempts: done.attempts })
            }
            Err(failure) => {
                self.retries.fetch_add(u64::from(failure.retries()), Ordering::Relaxed);
                Err(escalate(failure, options.timeout_secs))
            }
        }
    }

    /// One minimal SVG render, outside the cache and retry budget.
    pub async fn test_connection(&self, timeout: Duration) -> bool {
        match self
            .transport
            .post(DiagramType::Graphviz, ImageFormat::Svg, PROBE_SOURCE, timeout)
            .await
        {
            Ok(body) if !body.is_empty() => {
                info!(bytes = body.len(), "render: service reachable");
                true
            }
            Ok(_) => {
                warn!("render: service answered the probe with an empty body");
                false
            }
            Err(e) => {
                warn!(error = %e, "render: service unreachable");
                false
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> RenderStats {
        RenderStats {
            cache: self.cache.stats(),
            network_calls: self.network_calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            cached_bytes: self.cache.fold_values(0, |total, bytes| total + bytes.len()),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("render: image cache cleared");
    }

    pub fn reset_stats(&self) {
        self.cache.reset_stats();
        self.network_calls.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
    }
}

fn escalate(failure: RetryFailure<HttpFailure>, timeout_secs: u64) -> SketchError {
    let RetryFailure { error, attempts, exhausted, .. } = failure;
    match error {
        HttpFailure::Timeout if exhausted => SketchError::Timeout { service: Service::Render, attempts, timeout_secs },
        other => SketchError::Upstream {
            service: Service::Render,
            attempts,
            status: other.status(),
            last_error: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

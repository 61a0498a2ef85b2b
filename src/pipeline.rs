//! End-to-end orchestration: requirement text to explanation, graph, DOT
//! source and rendered images.
//!
//! DESIGN
//! ======
//! The completion and render clients are owned here and share nothing but
//! the parse metrics. Completion and parse failures abort the run. Render
//! failures do not: every requested format carries its own `Result`, so an
//! unreachable render service still leaves the explanation and graph usable.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::LruCache;
use crate::config::SketchConfig;
use crate::diagram::dot::{DotOptions, build_dot};
use crate::diagram::{AssistedRepair, Graph, ParseDelta, ParseOptions, ParseOutcome, ResponseParser, Violation};
use crate::error::SketchError;
use crate::llm::{CompletionClient, CompletionResult, CompletionStats, LlmRepair};
use crate::metrics::{MetricsSnapshot, ParseMetrics};
use crate::render::{ImageFormat, RenderClient, RenderOptions, RenderResult, RenderStats};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchRequest {
    /// Image formats to render. Duplicates are rendered once.
    pub formats: Vec<ImageFormat>,
    pub strict: bool,
    pub assisted_repair: bool,
    pub use_cache: bool,
    /// Overrides the configured model.
    pub model: Option<String>,
}

impl Default for SketchRequest {
    fn default() -> Self {
        Self {
            formats: vec![ImageFormat::Png],
            strict: false,
            assisted_repair: false,
            use_cache: true,
            model: None,
        }
    }
}

/// One rendered (or failed) image.
#[derive(Debug)]
pub struct Export {
    pub format: ImageFormat,
    pub result: Result<RenderResult, SketchError>,
}

#[derive(Debug)]
pub struct SketchOutput {
    pub explanation: String,
    pub graph: Graph,
    pub violations: Vec<Violation>,
    pub dot: String,
    pub completion: CompletionResult,
    pub delta: ParseDelta,
    pub exports: Vec<Export>,
}

impl SketchOutput {
    /// Exports that rendered successfully.
    pub fn rendered(&self) -> impl Iterator<Item = &RenderResult> {
        self.exports.iter().flat_map(|export| &export.result)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SketchStats {
    pub completion: CompletionStats,
    pub render: RenderStats,
    pub parse: MetricsSnapshot,
}

// =============================================================================
// SKETCHER
// =============================================================================

pub struct Sketcher {
    completion: Arc<CompletionClient>,
    render: RenderClient,
    parser: ResponseParser,
    dot_options: DotOptions,
}

impl Sketcher {
    /// Wire both HTTP clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client fails to build.
    pub fn from_config(config: &SketchConfig) -> Result<Self, SketchError> {
        let completion = CompletionClient::from_settings(
            &config.llm,
            config.backoff,
            Arc::new(LruCache::new(config.cache.completion_capacity)),
        )?;
        let render = RenderClient::from_settings(
            &config.render,
            config.backoff,
            Arc::new(LruCache::new(config.cache.render_capacity)),
        )?;
        Ok(Self::new(Arc::new(completion), render, Arc::new(ParseMetrics::new())))
    }

    #[must_use]
    pub fn new(completion: Arc<CompletionClient>, render: RenderClient, metrics: Arc<ParseMetrics>) -> Self {
        Self { completion, render, parser: ResponseParser::new(metrics), dot_options: DotOptions::default() }
    }

    #[must_use]
    pub fn with_dot_options(mut self, dot_options: DotOptions) -> Self {
        self.dot_options = dot_options;
        self
    }

    /// Run the whole flow for one requirement.
    ///
    /// # Errors
    ///
    /// Completion and parse errors (including strict validation failures)
    /// are returned directly. Render errors are reported per export.
    pub async fn sketch(&self, requirement: &str, request: &SketchRequest) -> Result<SketchOutput, SketchError> {
        let mut params = self.completion.default_params();
        params.use_cache = request.use_cache;
        if let Some(model) = &request.model {
            params.model.clone_from(model);
        }

        let completion = self.completion.complete(requirement, &params).await?;
        let options = ParseOptions { assisted_repair: request.assisted_repair, strict: request.strict };
        let parsed = self.parse(&completion.text, options).await?;
        let dot = build_dot(&parsed.graph, &self.dot_options);
        let exports = self.export(&dot, &request.formats, request.use_cache).await;

        info!(
            cached = completion.cached,
            nodes = parsed.graph.nodes.len(),
            violations = parsed.violations.len(),
            rendered = exports.iter().filter(|e| e.result.is_ok()).count(),
            requested = exports.len(),
            "sketch: done"
        );

        Ok(SketchOutput {
            explanation: parsed.explanation,
            graph: parsed.graph,
            violations: parsed.violations,
            dot,
            completion,
            delta: parsed.delta,
            exports,
        })
    }

    /// Parse raw completion text with this sketcher's metrics and repairer.
    ///
    /// # Errors
    ///
    /// See [`ResponseParser::parse`].
    pub async fn parse(&self, raw: &str, options: ParseOptions) -> Result<ParseOutcome, SketchError> {
        let repair = LlmRepair::new(Arc::clone(&self.completion));
        let repair: &dyn AssistedRepair = &repair;
        self.parser.parse(raw, options, Some(repair)).await
    }

    #[must_use]
    pub fn dot(&self, graph: &Graph) -> String {
        build_dot(graph, &self.dot_options)
    }

    /// Connectivity check against the render service.
    pub async fn probe(&self, timeout: Duration) -> bool {
        self.render.test_connection(timeout).await
    }

    #[must_use]
    pub fn stats(&self) -> SketchStats {
        SketchStats {
            completion: self.completion.stats(),
            render: self.render.stats(),
            parse: self.parser.metrics().snapshot(),
        }
    }

    pub fn reset_stats(&self) {
        self.completion.reset_stats();
        self.render.reset_stats();
        self.parser.metrics().reset();
    }

    pub fn clear_caches(&self) {
        self.completion.clear_cache();
        self.render.clear_cache();
    }

    async fn export(&self, dot: &str, formats: &[ImageFormat], use_cache: bool) -> Vec<Export> {
        let mut unique: Vec<ImageFormat> = Vec::with_capacity(formats.len());
        for format in formats {
            if !unique.contains(format) {
                unique.push(*format);
            }
        }

        let renders = unique.into_iter().map(|format| async move {
            let options = RenderOptions { use_cache, ..self.render.default_options(format) };
            let result = self.render.render(dot, &options).await;
            if let Err(e) = &result {
                warn!(%format, error = %e, "sketch: export failed");
            }
            Export { format, result }
        });
        join_all(renders).await
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;

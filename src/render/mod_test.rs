use std::collections::VecDeque;
use std::sync::Mutex;

use super::*;
use crate::config::SketchConfig;
use crate::error::ErrorCode;

// =========================================================================
// MockRenderer
// =========================================================================

type Call = (DiagramType, ImageFormat, String, Duration);

struct MockRenderer {
    script: Mutex<VecDeque<Result<Vec<u8>, HttpFailure>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockRenderer {
    fn new(script: Vec<Result<Vec<u8>, HttpFailure>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), calls: Mutex::new(Vec::new()) })
    }

    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RenderTransport for MockRenderer {
    async fn post(
        &self,
        diagram_type: DiagramType,
        format: ImageFormat,
        source: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((diagram_type, format, source.to_owned(), timeout));
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(image()))
    }
}

const SOURCE: &str = "digraph architecture { \"A\" -> \"B\"; }";

fn image() -> Vec<u8> {
    vec![0x89; 512]
}

fn client(transport: Arc<MockRenderer>) -> RenderClient {
    let settings = SketchConfig::default().render;
    let backoff = BackoffSettings { base_ms: 0, max_ms: 0, jitter_ms: 0 };
    RenderClient::with_transport(transport, &settings, backoff, Arc::new(RenderCache::new(4)))
}

fn status(code: u16) -> HttpFailure {
    HttpFailure::Status { status: code, body: "err".into() }
}

// =========================================================================
// formats
// =========================================================================

#[test]
fn formats_parse_and_describe_themselves() {
    assert_eq!("PNG".parse::<ImageFormat>(), Ok(ImageFormat::Png));
    assert_eq!(" svg ".parse::<ImageFormat>(), Ok(ImageFormat::Svg));
    let err = "gif".parse::<ImageFormat>().unwrap_err();
    assert!(err.contains("png, svg, pdf"), "{err}");
    for format in ImageFormat::ALL {
        assert_eq!(format.to_string().parse::<ImageFormat>(), Ok(format));
    }
    assert_eq!(ImageFormat::Svg.mime_type(), "image/svg+xml");
    assert_eq!(ImageFormat::Pdf.extension(), "pdf");
    assert_eq!("dot".parse::<DiagramType>(), Ok(DiagramType::Graphviz));
    assert_eq!(DiagramType::PlantUml.to_string(), "plantuml");
}

#[test]
fn render_key_separates_type_format_and_source() {
    let base = RenderKey::new(DiagramType::Graphviz, ImageFormat::Png, SOURCE);
    assert_eq!(base, RenderKey::new(DiagramType::Graphviz, ImageFormat::Png, SOURCE));
    assert_ne!(base, RenderKey::new(DiagramType::Graphviz, ImageFormat::Svg, SOURCE));
    assert_ne!(base, RenderKey::new(DiagramType::Mermaid, ImageFormat::Png, SOURCE));
    assert_ne!(base, RenderKey::new(DiagramType::Graphviz, ImageFormat::Png, "digraph {}"));
    assert_eq!(base.short().len(), 8);
}

// =========================================================================
// render
// =========================================================================

#[tokio::test]
async fn empty_source_rejected_before_network() {
    let transport = MockRenderer::new(vec![]);
    let c = client(transport.clone());
    let err = c.render("  \n", &c.default_options(ImageFormat::Png)).await.unwrap_err();
    assert_eq!(err.error_code(), "E_VALIDATION");
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn default_options_use_configured_budget() {
    let transport = MockRenderer::new(vec![]);
    let c = client(transport.clone());
    c.render(SOURCE, &c.default_options(ImageFormat::Svg)).await.unwrap();

    let (diagram_type, format, source, timeout) = transport.calls.lock().unwrap()[0].clone();
    assert_eq!(diagram_type, DiagramType::Graphviz);
    assert_eq!(format, ImageFormat::Svg);
    assert_eq!(source, SOURCE);
    assert_eq!(timeout, Duration::from_secs(crate::config::DEFAULT_RENDER_TIMEOUT_SECS));
}

#[tokio::test]
async fn repeated_render_served_from_cache() {
    let transport = MockRenderer::new(vec![]);
    let c = client(transport.clone());
    let options = c.default_options(ImageFormat::Png);

    let first = c.render(SOURCE, &options).await.unwrap();
    let second = c.render(SOURCE, &options).await.unwrap();

    assert_eq!(transport.count(), 1);
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.attempts, 0);
    assert_eq!(first.bytes, second.bytes);

    let stats = c.stats();
    assert_eq!((stats.cache.hits, stats.cache.misses), (1, 1));
    assert_eq!(stats.cached_bytes, 512);
}

#[tokio::test]
async fn formats_are_cached_separately() {
    let transport = MockRenderer::new(vec![]);
    let c = client(transport.clone());
    c.render(SOURCE, &c.default_options(ImageFormat::Png)).await.unwrap();
    c.render(SOURCE, &c.default_options(ImageFormat::Svg)).await.unwrap();
    assert_eq!(transport.count(), 2);
    assert_eq!(c.stats().cache.size, 2);
}

#[tokio::test]
async fn disabled_cache_neither_reads_nor_writes() {
    let transport = MockRenderer::new(vec![]);
    let c = client(transport.clone());
    let options = RenderOptions { use_cache: false, ..c.default_options(ImageFormat::Png) };
    c.render(SOURCE, &options).await.unwrap();
    c.render(SOURCE, &options).await.unwrap();
    assert_eq!(transport.count(), 2);
    assert_eq!(c.stats().cache.size, 0);
}

#[tokio::test]
async fn small_body_is_retried() {
    let transport = MockRenderer::new(vec![Ok(vec![1; 10]), Ok(image())]);
    let c = client(transport.clone());
    let result = c.render(SOURCE, &c.default_options(ImageFormat::Png)).await.unwrap();
    assert_eq!(result.attempts, 2);
    assert_eq!(result.bytes.len(), 512);
    assert_eq!(c.stats().retries, 1);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let transport = MockRenderer::new(vec![Err(status(400))]);
    let c = client(transport.clone());
    let err = c.render(SOURCE, &c.default_options(ImageFormat::Png)).await.unwrap_err();
    assert!(matches!(err, SketchError::Upstream { service: Service::Render, attempts: 1, status: Some(400), .. }));
    assert_eq!(transport.count(), 1);
}

#[tokio::test]
async fn server_errors_exhaust_budget() {
    let transport = MockRenderer::new(vec![Err(status(503)), Err(status(503)), Err(status(503))]);
    let c = client(transport.clone());
    let err = c.render(SOURCE, &c.default_options(ImageFormat::Png)).await.unwrap_err();
    assert!(matches!(err, SketchError::Upstream { attempts: 3, status: Some(503), .. }));
    assert!(err.retryable());
    assert_eq!(c.stats().cache.size, 0);
}

#[tokio::test]
async fn exhausted_timeouts_report_the_deadline() {
    let transport = MockRenderer::new(vec![Err(HttpFailure::Timeout), Err(HttpFailure::Timeout)]);
    let c = client(transport.clone());
    let options = RenderOptions { max_retries: 2, timeout_secs: 7, ..c.default_options(ImageFormat::Pdf) };
    let err = c.render(SOURCE, &options).await.unwrap_err();
    assert!(matches!(err, SketchError::Timeout { service: Service::Render, attempts: 2, timeout_secs: 7 }));
}

#[tokio::test]
async fn clear_cache_and_reset_stats() {
    let transport = MockRenderer::new(vec![]);
    let c = client(transport.clone());
    let options = c.default_options(ImageFormat::Png);
    c.render(SOURCE, &options).await.unwrap();
    c.clear_cache();
    c.render(SOURCE, &options).await.unwrap();
    assert_eq!(transport.count(), 2);

    c.reset_stats();
    let stats = c.stats();
    assert_eq!((stats.network_calls, stats.retries, stats.cache.hits, stats.cache.misses), (0, 0, 0, 0));
}

// =========================================================================
// test_connection
// =========================================================================

#[tokio::test]
async fn test_connection_probes_once_without_cache() {
    let transport = MockRenderer::new(vec![Ok(vec![1; 20])]);
    let c = client(transport.clone());
    assert!(c.test_connection(Duration::from_secs(5)).await);

    let (diagram_type, format, _, timeout) = transport.calls.lock().unwrap()[0].clone();
    assert_eq!((diagram_type, format), (DiagramType::Graphviz, ImageFormat::Svg));
    assert_eq!(timeout, Duration::from_secs(5));
    assert_eq!(c.stats().cache.size, 0);
}

#[tokio::test]
async fn test_connection_false_on_failure() {
    let transport = MockRenderer::new(vec![Err(status(503))]);
    let c = client(transport.clone());
    assert!(!c.test_connection(Duration::from_secs(5)).await);
    assert_eq!(transport.count(), 1);
}

//! Kroki HTTP transport: `POST {base}/{diagram_type}/{format}` with the
//! diagram source as a `text/plain` body.

use std::time::Duration;

use super::{DiagramType, ImageFormat, RenderTransport};
use crate::error::SketchError;
use crate::http::HttpFailure;

pub struct KrokiTransport {
    http: reqwest::Client,
    base_url: String,
}

impl KrokiTransport {
    /// # Errors
    ///
    /// Returns `SketchError::HttpClientBuild` if the reqwest client fails to build.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, SketchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SketchError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, diagram_type: DiagramType, format: ImageFormat) -> String {
        format!("{}/{diagram_type}/{format}", self.base_url)
    }
}

#[async_trait::async_trait]
impl RenderTransport for KrokiTransport {
    async fn post(
        &self,
        diagram_type: DiagramType,
        format: ImageFormat,
        source: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpFailure> {
        let response = self
            .http
            .post(self.url(diagram_type, format))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .timeout(timeout)
            .body(source.to_owned())
            .send()
            .await
            .map_err(HttpFailure::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpFailure::Status { status: status.as_u16(), body });
        }
        let bytes = response.bytes().await.map_err(HttpFailure::from_reqwest)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "kroki_test.rs"]
mod tests;

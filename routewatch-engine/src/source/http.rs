//! Snapshot source backed by the analytics HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use routewatch_types::{AnalyticsDomain, Filter};
use tracing::debug;

use super::{SnapshotPayload, SnapshotSource};
use crate::config::FetchConfig;
use crate::EngineError;

/// Fetches domain snapshots with `GET {base}{path}?timeRange=..&routerId=..`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: Client,
    base_url: String,
}

impl HttpSnapshotSource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> HttpSnapshotSourceBuilder {
        HttpSnapshotSourceBuilder::default()
    }

    /// Build a source from the `[fetch]` configuration section.
    pub fn from_config(config: &FetchConfig) -> Result<Self, EngineError> {
        Self::builder()
            .base_url(&config.base_url)
            .timeout(config.request_timeout())
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, domain: AnalyticsDomain) -> String {
        format!("{}{}", self.base_url, domain.path())
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(
        &self,
        domain: AnalyticsDomain,
        filter: &Filter,
    ) -> Result<SnapshotPayload, EngineError> {
        let url = self.url_for(domain);
        debug!(%domain, %url, %filter, "Requesting snapshot");

        let response = self
            .client
            .get(&url)
            .query(&filter.query_pairs())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EngineError::Transport("unauthorized".to_string()));
        }

        if !response.status().is_success() {
            return Err(EngineError::Transport(format!(
                "{} returned status {}",
                domain.path(),
                response.status()
            )));
        }

        let body = response.bytes().await?;
        SnapshotPayload::from_json(domain, &body)
    }

    fn description(&self) -> &str {
        &self.base_url
    }
}

/// Builder for HttpSnapshotSource.
#[derive(Debug, Default)]
pub struct HttpSnapshotSourceBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    no_proxy: bool,
}

impl HttpSnapshotSourceBuilder {
    /// Set the server base URL (default: "http://localhost:8080").
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the client-side request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Ignore proxy settings from the environment.
    pub fn no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<HttpSnapshotSource, EngineError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let mut client = Client::builder().timeout(timeout);
        if self.no_proxy {
            client = client.no_proxy();
        }
        let client = client
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| "http://localhost:8080".to_string());

        Ok(HttpSnapshotSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewatch_types::{MetricKey, TimeRange};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response and hand back the request head.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_builder_defaults() {
        let source = HttpSnapshotSource::builder().build().unwrap();
        assert_eq!(source.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let source = HttpSnapshotSource::builder()
            .base_url("http://sim.local:9000/")
            .build()
            .unwrap();
        assert_eq!(
            source.url_for(AnalyticsDomain::Shaping),
            "http://sim.local:9000/api/v1/analytics/traffic-shaping"
        );
    }

    #[tokio::test]
    async fn fetch_sends_filter_and_decodes_envelope() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"status":"success","data":[{"timestamp":1,"value":2.5}]}"#,
        )
        .await;
        let source = HttpSnapshotSource::builder()
            .base_url(base)
            .no_proxy()
            .build()
            .unwrap();

        let filter = Filter::new(TimeRange::LastWeek, "edge-2");
        let payload = source.fetch(AnalyticsDomain::Performance, &filter).await.unwrap();
        assert_eq!(payload.series[&MetricKey::Latency].len(), 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v1/analytics/performance?timeRange=7d&routerId=edge-2 "));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_transport() {
        let (base, _server) = serve_once("401 Unauthorized", "{}").await;
        let source = HttpSnapshotSource::builder()
            .base_url(base)
            .no_proxy()
            .build()
            .unwrap();

        let err = source
            .fetch(AnalyticsDomain::Traffic, &Filter::default())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Transport("unauthorized".to_string()));
    }

    #[tokio::test]
    async fn server_error_maps_to_transport() {
        let (base, _server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":"Failed to get traffic stats"}"#,
        )
        .await;
        let source = HttpSnapshotSource::builder()
            .base_url(base)
            .no_proxy()
            .build()
            .unwrap();

        let err = source
            .fetch(AnalyticsDomain::Traffic, &Filter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transport(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSnapshotSource::builder()
            .base_url(format!("http://{addr}"))
            .no_proxy()
            .build()
            .unwrap();
        let err = source
            .fetch(AnalyticsDomain::Routing, &Filter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
    }
}

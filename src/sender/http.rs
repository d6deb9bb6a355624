use super::transport::{CollectorResponse, Transport, TransportError};
use crate::queue::QueueEntry;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::header::{
    CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum TransportBuildError {
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub endpoint: String,
    pub app_token: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
    /// Batches at or above this many records are gzipped.
    pub compression_threshold: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://collect.tracklet.io".to_string(),
            app_token: String::new(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: format!("tracklet/{}", env!("CARGO_PKG_VERSION")),
            enable_compression: true,
            compression_threshold: 20,
        }
    }
}

/// Wire form of a single record line. Retry count rides along so the
/// collector can observe redelivery.
#[derive(Serialize)]
struct WireRecord<'a> {
    id: String,
    device_id: &'a str,
    sequence: u64,
    kind: &'static str,
    created_at: String,
    retry_count: u32,
    payload: &'a HashMap<String, String>,
}

impl<'a> WireRecord<'a> {
    fn from_entry(entry: &'a QueueEntry) -> Self {
        let record = entry.record();
        Self {
            id: record.id().to_string(),
            device_id: &record.id().device_id,
            sequence: record.id().sequence,
            kind: record.kind().as_str(),
            created_at: record.created_at().to_rfc3339(),
            retry_count: entry.retry_count(),
            payload: record.payload(),
        }
    }
}

/// Default transport: NDJSON batches over an authenticated HTTPS channel.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
    submit_url: Url,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, TransportBuildError> {
        let endpoint_url: Url = config
            .endpoint
            .parse()
            .map_err(|e| TransportBuildError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;

        let submit_url = if endpoint_url.path().ends_with("/v1/track") {
            endpoint_url
        } else {
            let mut url = endpoint_url;
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(&format!("{path}/v1/track"));
            url
        };

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| TransportBuildError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            config,
            submit_url,
        })
    }

    fn prepare_payload(&self, batch: &[QueueEntry]) -> Result<(Vec<u8>, bool), TransportError> {
        let mut buffer = Vec::with_capacity(batch.len() * 256);
        for entry in batch {
            let line = WireRecord::from_entry(entry);
            serde_json::to_writer(&mut buffer, &line)
                .map_err(|e| TransportError::Transient(format!("serialization failed: {e}")))?;
            buffer.push(b'\n');
        }

        let compress =
            self.config.enable_compression && batch.len() >= self.config.compression_threshold;
        if compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder
                .write_all(&buffer)
                .and_then(|()| encoder.finish())
                .map(|compressed| (compressed, true))
                .map_err(|e| TransportError::Transient(format!("compression failed: {e}")))
        } else {
            Ok((buffer, false))
        }
    }

    fn build_headers(
        &self,
        batch: &[QueueEntry],
        compressed: bool,
    ) -> Result<HeaderMap, TransportError> {
        // A value that cannot form a header will fail every retry.
        let invalid = |e: reqwest::header::InvalidHeaderValue| TransportError::Permanent {
            status: 0,
            message: format!("invalid header value: {e}"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));
        if compressed {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
        headers.insert(
            HeaderName::from_static("x-app-token"),
            HeaderValue::from_str(&self.config.app_token).map_err(invalid)?,
        );
        headers.insert(
            HeaderName::from_static("x-batch-size"),
            HeaderValue::from_str(&batch.len().to_string()).map_err(invalid)?,
        );
        headers.insert(
            HeaderName::from_static("x-client-version"),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent).map_err(invalid)?,
        );
        Ok(headers)
    }

    fn classify_status(status: StatusCode) -> bool {
        // true: worth retrying
        status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[QueueEntry]) -> Result<CollectorResponse, TransportError> {
        let (payload, compressed) = self.prepare_payload(batch)?;
        let headers = self.build_headers(batch, compressed)?;
        let bytes_sent = payload.len();

        debug!(
            "submitting batch of {} records ({bytes_sent} bytes, compressed: {compressed})",
            batch.len()
        );

        let response = self
            .client
            .post(self.submit_url.clone())
            .headers(headers)
            .body(payload)
            .send()
            .await
            .map_err(|e| TransportError::Transient(format!("network error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Transient(format!("failed to read response: {e}")))?;
            if body.is_empty() {
                return Ok(CollectorResponse::default());
            }
            let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
                TransportError::Permanent {
                    status: status.as_u16(),
                    message: format!("malformed collector response: {e}"),
                }
            })?;
            CollectorResponse::from_json(value).map_err(|e| TransportError::Permanent {
                status: status.as_u16(),
                message: format!("malformed collector response: {e}"),
            })
        } else if Self::classify_status(status) {
            warn!("collector returned retryable status {status}");
            Err(TransportError::Transient(format!("HTTP {status}")))
        } else {
            let message = response.text().await.unwrap_or_default();
            let message = message.chars().take(256).collect::<String>();
            Err(TransportError::Permanent {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

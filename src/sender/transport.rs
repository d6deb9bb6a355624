use crate::queue::QueueEntry;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Expected to succeed on retry: network failures, timeouts, 5xx.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// Will not succeed on retry: other 4xx or a malformed response.
    #[error("permanent transport failure (HTTP {status}): {message}")]
    Permanent { status: u16, message: String },
}

impl TransportError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Parsed collector acknowledgment for a delivered batch.
///
/// The collector answers with a loose JSON object; the known fields are
/// pulled out here and the full body is kept for callback consumers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectorResponse {
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub adid: Option<String>,
    pub attribution: Option<serde_json::Value>,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl CollectorResponse {
    /// Schema-validate a response body. A body that does not match the
    /// expected shape is a parse failure, not a silently-empty response.
    pub fn from_json(body: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut response: Self = serde_json::from_value(body.clone())?;
        response.raw = body;
        Ok(response)
    }
}

/// Delivery channel to the remote collector.
///
/// Implementations are selected by runtime configuration; the core never
/// speaks HTTP directly. The batch slice is an ordered FIFO prefix of the
/// queue and must be submitted as one request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &[QueueEntry]) -> Result<CollectorResponse, TransportError>;

    fn endpoint(&self) -> &str;
}

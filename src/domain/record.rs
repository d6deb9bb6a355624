use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of trackable fact destined for the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    SessionStart,
    SessionEnd,
    Event,
    AdRevenue,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::Event => "event",
            Self::AdRevenue => "ad_revenue",
        }
    }

    /// Session records resolve through the session callbacks, everything
    /// else through the event callbacks.
    #[must_use]
    pub const fn is_session(&self) -> bool {
        matches!(self, Self::SessionStart | Self::SessionEnd)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a record: device id plus a per-device sequence.
///
/// The sequence is strictly increasing across restarts, so the pair is
/// globally unique and the collector can dedupe redelivered records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub device_id: String,
    pub sequence: u64,
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.device_id, self.sequence)
    }
}

/// A single trackable fact ready for queuing and transmission.
///
/// Immutable once constructed; delivery state (retry count, enqueue time)
/// lives on the queue entry, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    kind: RecordKind,
    created_at: DateTime<Utc>,
    payload: HashMap<String, String>,
}

impl Record {
    #[must_use]
    pub fn new(id: RecordId, kind: RecordKind, payload: HashMap<String, String>) -> Self {
        Self {
            id,
            kind,
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &HashMap<String, String> {
        &self.payload
    }

    /// Event token carried in the payload, if any.
    pub fn event_token(&self) -> Option<&str> {
        self.payload.get("event_token").map(String::as_str)
    }
}

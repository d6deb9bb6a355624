use crate::domain::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue-local entry identifier. Equal to the record's sequence number, so
/// directory listings of persisted entries sort in enqueue order.
pub type EntryId = u64;

/// Delivery state of a queued record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    InFlight,
    Delivered,
    Failed,
}

/// A record wrapped with its delivery state.
///
/// Entries move Pending -> InFlight -> (acknowledged and removed) or back to
/// Pending on transient failure with the retry count bumped. An entry found
/// InFlight on reopen is recovered to Pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    entry_id: EntryId,
    record: Record,
    state: DeliveryState,
    retry_count: u32,
    enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub(crate) fn new(record: Record) -> Self {
        Self {
            entry_id: record.id().sequence,
            record,
            state: DeliveryState::Pending,
            retry_count: 0,
            enqueued_at: Utc::now(),
        }
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub(crate) fn set_state(&mut self, state: DeliveryState) {
        self.state = state;
    }

    pub(crate) fn bump_retry(&mut self) {
        self.retry_count += 1;
    }
}

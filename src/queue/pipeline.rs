use super::entry::EntryId;
use super::persistent::{PersistentQueue, QueueError};
use crate::domain::{Record, RecordId, RecordKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared record construction path used by the facade and the session
/// manager: allocates ids, merges client info into payloads, enqueues, and
/// wakes the delivery worker.
pub struct RecordPipeline {
    queue: Arc<PersistentQueue>,
    wake: Arc<Notify>,
    device_id: String,
    client_info: RwLock<HashMap<String, String>>,
}

impl RecordPipeline {
    pub fn new(queue: Arc<PersistentQueue>, wake: Arc<Notify>, device_id: String) -> Self {
        Self {
            queue,
            wake,
            device_id,
            client_info: RwLock::new(HashMap::new()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Set a client-info field merged into the payload of records created
    /// from here on (push token, install referrer). Explicit payload keys
    /// win over client info.
    pub fn set_client_field(&self, key: &str, value: &str) {
        self.client_info
            .write()
            .insert(key.to_string(), value.to_string());
    }

    /// Build a record with the next sequence and enqueue it.
    pub fn submit(
        &self,
        kind: RecordKind,
        payload: HashMap<String, String>,
    ) -> Result<EntryId, QueueError> {
        let mut merged = self.client_info.read().clone();
        merged.extend(payload);

        let sequence = self.queue.allocate_sequence();
        let record = Record::new(
            RecordId {
                device_id: self.device_id.clone(),
                sequence,
            },
            kind,
            merged,
        );

        let id = self.queue.enqueue(record)?;
        self.wake.notify_one();
        Ok(id)
    }
}

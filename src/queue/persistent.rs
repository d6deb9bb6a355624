use super::entry::{DeliveryState, EntryId, QueueEntry};
use super::store::{EntryStore, StoreError};
use crate::domain::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("storage fault: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub storage_dir: PathBuf,
    /// Maximum queued entries; oldest Pending entries are evicted beyond this.
    pub max_entries: usize,
    /// Local attempts for a durable write before the record is dropped.
    pub write_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_dir: std::env::temp_dir().join("tracklet").join("queue"),
            max_entries: 10_000,
            write_retries: 3,
        }
    }
}

/// Counters mirroring the queue's lifetime activity.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub len: usize,
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub evicted: u64,
    pub dropped_writes: u64,
}

struct QueueInner {
    entries: VecDeque<QueueEntry>,
    next_sequence: u64,
    enqueued: u64,
    delivered: u64,
    failed: u64,
    evicted: u64,
    dropped_writes: u64,
}

/// Durable, ordered, at-least-once delivery queue.
///
/// Entries are delivered in FIFO enqueue order, never reordered, and removed
/// only on acknowledgment or permanent failure. State is persisted after
/// every transition so an entry stuck InFlight at a crash recovers to
/// Pending on reopen.
pub struct PersistentQueue {
    store: EntryStore,
    inner: Mutex<QueueInner>,
    config: QueueConfig,
}

impl PersistentQueue {
    pub fn open(config: QueueConfig) -> Result<Self, QueueError> {
        let store = EntryStore::open(&config.storage_dir)?;
        let mut entries: VecDeque<QueueEntry> = store.load_all()?.into();

        let mut recovered = 0usize;
        for entry in &mut entries {
            if entry.state() == DeliveryState::InFlight {
                entry.set_state(DeliveryState::Pending);
                if let Err(e) = store.persist(entry) {
                    tracing::warn!("failed to persist recovered entry {}: {e}", entry.entry_id());
                }
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::info!("recovered {recovered} in-flight entries to pending");
        }

        let max_seen = entries.back().map_or(0, |e| e.entry_id() + 1);
        let next_sequence = store.load_sequence()?.max(max_seen);

        Ok(Self {
            store,
            inner: Mutex::new(QueueInner {
                entries,
                next_sequence,
                enqueued: 0,
                delivered: 0,
                failed: 0,
                evicted: 0,
                dropped_writes: 0,
            }),
            config,
        })
    }

    /// Allocate the next record sequence for this device. The high-water
    /// mark is persisted so ids stay strictly increasing across restarts.
    pub fn allocate_sequence(&self) -> u64 {
        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        if let Err(e) = self.store.persist_sequence(inner.next_sequence) {
            tracing::warn!("failed to persist sequence high-water mark: {e}");
        }
        sequence
    }

    /// Append a record. On storage failure the write is retried locally,
    /// then the record is dropped with a warning; the caller is never
    /// crashed.
    pub fn enqueue(&self, record: Record) -> Result<EntryId, QueueError> {
        let mut inner = self.inner.lock();

        while inner.entries.len() >= self.config.max_entries {
            let Some(pos) = inner
                .entries
                .iter()
                .position(|e| e.state() == DeliveryState::Pending)
            else {
                break;
            };
            if let Some(victim) = inner.entries.remove(pos) {
                if let Err(e) = self.store.remove(victim.entry_id()) {
                    tracing::warn!("failed to remove evicted entry {}: {e}", victim.entry_id());
                }
                inner.evicted += 1;
                tracing::warn!(
                    "queue at capacity ({}), evicted oldest pending record {}",
                    self.config.max_entries,
                    victim.record().id()
                );
            }
        }

        let entry = QueueEntry::new(record);
        let id = entry.entry_id();

        let mut last_err = None;
        for attempt in 1..=self.config.write_retries.max(1) {
            match self.store.persist(&entry) {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    tracing::debug!("durable write attempt {attempt} for {id} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        if let Some(e) = last_err {
            inner.dropped_writes += 1;
            tracing::warn!(
                "dropping record {} after {} failed write attempts: {e}",
                entry.record().id(),
                self.config.write_retries
            );
            return Err(QueueError::Storage(e));
        }

        inner.entries.push_back(entry);
        inner.enqueued += 1;
        Ok(id)
    }

    /// Return up to `max` of the oldest Pending entries and mark them
    /// InFlight. The delivery worker calls this with at most one batch
    /// outstanding, so returned entries are always a contiguous FIFO prefix.
    pub fn peek_batch(&self, max: usize) -> Vec<QueueEntry> {
        let mut inner = self.inner.lock();
        let mut batch = Vec::new();

        for entry in inner.entries.iter_mut() {
            if batch.len() >= max {
                break;
            }
            if entry.state() != DeliveryState::Pending {
                continue;
            }
            entry.set_state(DeliveryState::InFlight);
            if let Err(e) = self.store.persist(entry) {
                tracing::warn!("failed to persist in-flight entry {}: {e}", entry.entry_id());
            }
            batch.push(entry.clone());
        }

        batch
    }

    /// Remove a delivered entry permanently. Acknowledging an id that is
    /// already gone is a no-op.
    pub fn acknowledge(&self, id: EntryId) {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.entries.iter().position(|e| e.entry_id() == id) else {
            return;
        };
        if let Some(mut entry) = inner.entries.remove(pos) {
            entry.set_state(DeliveryState::Delivered);
            if let Err(e) = self.store.remove(id) {
                tracing::warn!("failed to remove acknowledged entry {id}: {e}");
            }
            inner.delivered += 1;
        }
    }

    /// Return an InFlight entry to Pending after a transient failure,
    /// bumping its retry count. The entry keeps its queue position.
    pub fn requeue(&self, id: EntryId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner
            .entries
            .iter_mut()
            .find(|e| e.entry_id() == id && e.state() == DeliveryState::InFlight)
        else {
            return;
        };
        entry.set_state(DeliveryState::Pending);
        entry.bump_retry();
        if let Err(e) = self.store.persist(entry) {
            tracing::warn!("failed to persist requeued entry {id}: {e}");
        }
    }

    /// Drop an entry that failed permanently.
    pub fn mark_failed(&self, id: EntryId) {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.entries.iter().position(|e| e.entry_id() == id) else {
            return;
        };
        if let Some(mut entry) = inner.entries.remove(pos) {
            entry.set_state(DeliveryState::Failed);
            if let Err(e) = self.store.remove(id) {
                tracing::warn!("failed to remove failed entry {id}: {e}");
            }
            inner.failed += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the queued entries in order, for inspection.
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            len: inner.entries.len(),
            enqueued: inner.enqueued,
            delivered: inner.delivered,
            failed: inner.failed,
            evicted: inner.evicted,
            dropped_writes: inner.dropped_writes,
        }
    }
}

impl std::fmt::Debug for PersistentQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("PersistentQueue")
            .field("len", &stats.len)
            .field("enqueued", &stats.enqueued)
            .field("delivered", &stats.delivered)
            .field("failed", &stats.failed)
            .field("evicted", &stats.evicted)
            .finish()
    }
}

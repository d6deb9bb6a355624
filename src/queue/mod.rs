//! Durable FIFO queue of records awaiting delivery.
//!
//! Entries are persisted one file per record and recovered on reopen, so a
//! crash between delivery attempts never loses queued state. All state
//! transitions go through one mutex to keep FIFO order intact under
//! concurrent enqueue/drain.

pub mod entry;
pub mod persistent;
pub mod pipeline;
pub mod store;

pub use entry::{DeliveryState, EntryId, QueueEntry};
pub use persistent::{PersistentQueue, QueueConfig, QueueError, QueueStats};
pub use pipeline::RecordPipeline;
pub use store::{EntryStore, StoreError};

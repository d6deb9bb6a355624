//! Background delivery: drains the queue, talks to the transport, applies
//! retry/backoff, and resolves callbacks.

pub mod delivery;
pub mod retry;

pub use delivery::{DeliveryWorker, WorkerConfig, WorkerGates};
pub use retry::{BackoffConfig, BackoffPolicy};

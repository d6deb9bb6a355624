//! Domain layer for tracklet.
//!
//! Contains the canonical types shared across all modules:
//! - `Record`: the single trackable fact flowing through the pipeline
//! - `RecordId`/`RecordKind`: record identity and tagged-union kind
//! - `AttributionSnapshot`: campaign metadata from the collector

pub mod attribution;
pub mod record;

pub use attribution::AttributionSnapshot;
pub use record::{Record, RecordId, RecordKind};

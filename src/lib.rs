#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(clippy::manual_let_else, clippy::semicolon_if_nothing_returned)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_precision_loss,     // Acceptable for backoff jitter math
    clippy::cast_possible_truncation, // Safe within realistic duration bounds
    clippy::cast_sign_loss,          // Safe where values are known non-negative
    clippy::missing_errors_doc,      // Internal API
    clippy::missing_panics_doc,      // Internal API
    clippy::module_name_repetitions, // e.g. QueueError in queue module
    clippy::must_use_candidate       // Annotated selectively on critical APIs
)]

pub mod attribution;
pub mod client;
pub mod domain;
pub mod queue;
pub mod sender;
pub mod session;
pub mod worker;

// Re-export the facade surface for easy access
pub use client::{
    AdRevenue, Config, ConfigError, Environment, Event, LogLevel, StartError, Tracker,
    TrackerError, attribution as current_attribution, is_enabled, on_pause, on_resume,
    set_device_token, set_enabled, set_offline_mode, set_referrer, shutdown, start,
    track_ad_revenue, track_event,
};
pub use domain::{AttributionSnapshot, Record, RecordId, RecordKind};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Public client surface: the `Tracker` handle, the process-wide facade
//! functions, configuration, callbacks, and logging setup.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod event;
pub mod facade;
pub mod identity;
mod logging;

pub use callbacks::{
    CallbackRegistry, EventFailure, EventSuccess, SessionFailure, SessionSuccess,
};
pub use config::{Config, ConfigError, Environment, LogLevel};
pub use error::{StartError, TrackerError};
pub use event::{AdRevenue, Event};
pub use facade::{
    Tracker, attribution, is_enabled, on_pause, on_resume, set_device_token, set_enabled,
    set_offline_mode, set_referrer, shutdown, start, track_ad_revenue, track_event,
};
pub use identity::{IdentifierProvider, StoredInstallationId};

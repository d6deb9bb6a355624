use super::callbacks::CallbackRegistry;
use super::identity::IdentifierProvider;
use crate::sender::Transport;
use crate::worker::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("app token must not be empty")]
    MissingAppToken,
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Collector environment. Sandbox traffic is segregated server-side and
/// never counts toward production attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub const fn collector_endpoint(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://collect.sandbox.tracklet.io",
            Self::Production => "https://collect.tracklet.io",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Client configuration, built fluently and validated at `Tracker::start`.
#[derive(Clone)]
pub struct Config {
    pub(crate) app_token: String,
    pub(crate) environment: Environment,
    pub(crate) log_level: LogLevel,
    pub(crate) event_buffering_enabled: bool,
    pub(crate) start_manually: bool,
    pub(crate) offline_mode: bool,
    pub(crate) inactivity_threshold: Duration,
    pub(crate) storage_dir: PathBuf,
    pub(crate) queue_capacity: usize,
    pub(crate) write_retries: u32,
    pub(crate) batch_max: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) send_timeout: Duration,
    pub(crate) backoff: BackoffConfig,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) identifier_provider: Option<Arc<dyn IdentifierProvider>>,
}

impl Config {
    pub fn new(app_token: impl Into<String>, environment: Environment) -> Self {
        Self {
            app_token: app_token.into(),
            environment,
            log_level: LogLevel::Info,
            event_buffering_enabled: false,
            start_manually: true,
            offline_mode: false,
            inactivity_threshold: Duration::from_secs(30 * 60),
            storage_dir: std::env::temp_dir().join("tracklet"),
            queue_capacity: 10_000,
            write_retries: 3,
            batch_max: 100,
            flush_interval: Duration::from_millis(500),
            send_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
            callbacks: CallbackRegistry::new(),
            transport: None,
            identifier_provider: None,
        }
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Batch several events per request instead of sending each immediately.
    #[must_use]
    pub fn with_event_buffering(mut self, enabled: bool) -> Self {
        self.event_buffering_enabled = enabled;
        self
    }

    /// With manual start disabled, `Tracker::start` feeds the first resume
    /// itself; otherwise the application drives `on_resume`/`on_pause`.
    #[must_use]
    pub fn with_manual_start(mut self, manual: bool) -> Self {
        self.start_manually = manual;
        self
    }

    #[must_use]
    pub fn with_offline_mode(mut self, offline: bool) -> Self {
        self.offline_mode = offline;
        self
    }

    #[must_use]
    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.inactivity_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_batch_limit(mut self, max: usize) -> Self {
        self.batch_max = max;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the default HTTP transport; how batches reach the collector
    /// is a runtime decision.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_identifier_provider(mut self, provider: Arc<dyn IdentifierProvider>) -> Self {
        self.identifier_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn on_event_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(super::callbacks::EventSuccess) + Send + Sync + 'static,
    {
        self.callbacks.set_event_success(handler);
        self
    }

    #[must_use]
    pub fn on_event_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(super::callbacks::EventFailure) + Send + Sync + 'static,
    {
        self.callbacks.set_event_failure(handler);
        self
    }

    #[must_use]
    pub fn on_session_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(super::callbacks::SessionSuccess) + Send + Sync + 'static,
    {
        self.callbacks.set_session_success(handler);
        self
    }

    #[must_use]
    pub fn on_session_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(super::callbacks::SessionFailure) + Send + Sync + 'static,
    {
        self.callbacks.set_session_failure(handler);
        self
    }

    #[must_use]
    pub fn on_attribution_changed<F>(mut self, handler: F) -> Self
    where
        F: Fn(crate::domain::AttributionSnapshot) + Send + Sync + 'static,
    {
        self.callbacks.set_attribution_changed(handler);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.app_token.trim().is_empty() {
            return Err(ConfigError::MissingAppToken);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacity must be > 0".into()));
        }
        if self.batch_max == 0 {
            return Err(ConfigError::Invalid("batch limit must be > 0".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("event_buffering_enabled", &self.event_buffering_enabled)
            .field("start_manually", &self.start_manually)
            .field("offline_mode", &self.offline_mode)
            .field("storage_dir", &self.storage_dir)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

use super::config::Config;
use super::error::{StartError, TrackerError};
use super::event::{AdRevenue, Event};
use super::identity::{IdentifierProvider, StoredInstallationId};
use super::logging::init_logging;
use crate::attribution::AttributionTracker;
use crate::domain::{AttributionSnapshot, RecordKind};
use crate::queue::{PersistentQueue, QueueConfig, QueueStats, RecordPipeline};
use crate::sender::{HttpConfig, HttpTransport, Transport};
use crate::session::{SessionConfig, SessionManager, SessionPhase};
use crate::worker::{BackoffPolicy, DeliveryWorker, WorkerConfig, WorkerGates};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Chosen to fit inside a typical platform background-grace window while
// leaving room for the in-flight batch to resolve.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(4);

struct TrackerInner {
    queue: Arc<PersistentQueue>,
    pipeline: Arc<RecordPipeline>,
    session: Arc<SessionManager>,
    attribution: Arc<AttributionTracker>,
    gates: Arc<WorkerGates>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running tracking client.
///
/// Cheap to clone; all clones share the same queue, worker, and state. The
/// process-wide free functions in this module wrap one installed handle.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Validate the configuration, recover the durable queue, and spawn the
    /// delivery worker. Requires a tokio runtime context.
    pub async fn start(config: Config) -> Result<Self, StartError> {
        config.validate()?;
        init_logging(config.log_level);

        let queue = Arc::new(PersistentQueue::open(QueueConfig {
            storage_dir: config.storage_dir.clone(),
            max_entries: config.queue_capacity,
            write_retries: config.write_retries,
        })?);

        let device_id = match &config.identifier_provider {
            Some(provider) => provider.device_id(),
            None => StoredInstallationId::load_or_create(&config.storage_dir)?.device_id(),
        };

        let transport: Arc<dyn Transport> = match config.transport.clone() {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(HttpConfig {
                endpoint: config.environment.collector_endpoint().to_string(),
                app_token: config.app_token.clone(),
                timeout: config.send_timeout,
                ..HttpConfig::default()
            })?),
        };

        let wake = Arc::new(Notify::new());
        let gates = Arc::new(WorkerGates::new(true, config.offline_mode));
        let cancel = CancellationToken::new();
        let attribution = Arc::new(AttributionTracker::new());
        let callbacks = Arc::new(config.callbacks.clone());

        let pipeline = Arc::new(RecordPipeline::new(
            Arc::clone(&queue),
            Arc::clone(&wake),
            device_id,
        ));
        let session = SessionManager::new(
            SessionConfig {
                inactivity_threshold: config.inactivity_threshold,
            },
            Arc::clone(&pipeline),
            tokio::runtime::Handle::current(),
        );

        let worker = DeliveryWorker::new(
            Arc::clone(&queue),
            transport,
            BackoffPolicy::new(config.backoff.clone()),
            callbacks,
            Arc::clone(&attribution),
            Arc::clone(&gates),
            Arc::clone(&wake),
            cancel.clone(),
            WorkerConfig {
                batch_max: config.batch_max,
                flush_interval: config.flush_interval,
                send_timeout: config.send_timeout,
                event_buffering: config.event_buffering_enabled,
            },
        )
        .spawn();

        let tracker = Self {
            inner: Arc::new(TrackerInner {
                queue,
                pipeline,
                session,
                attribution,
                gates,
                wake,
                cancel,
                worker: Mutex::new(Some(worker)),
            }),
        };

        info!(
            "tracklet {} started (environment: {})",
            crate::VERSION,
            config.environment
        );

        if !config.start_manually {
            tracker.on_resume();
        }

        Ok(tracker)
    }

    /// Queue an event for delivery. With tracking disabled the event is
    /// dropped quietly.
    pub fn track_event(&self, event: Event) -> Result<(), TrackerError> {
        if !self.inner.gates.is_enabled() {
            debug!("tracking disabled, dropping event");
            return Ok(());
        }
        event.validate().map_err(TrackerError::InvalidEvent)?;
        self.inner.session.record_activity();
        self.inner
            .pipeline
            .submit(RecordKind::Event, event.into_payload())?;
        Ok(())
    }

    pub fn track_ad_revenue(&self, ad_revenue: AdRevenue) -> Result<(), TrackerError> {
        if !self.inner.gates.is_enabled() {
            debug!("tracking disabled, dropping ad revenue");
            return Ok(());
        }
        ad_revenue.validate().map_err(TrackerError::InvalidEvent)?;
        self.inner.session.record_activity();
        self.inner
            .pipeline
            .submit(RecordKind::AdRevenue, ad_revenue.into_payload())?;
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        info!("tracking {}", if enabled { "enabled" } else { "disabled" });
        self.inner.gates.set_enabled(enabled);
        self.inner.wake.notify_one();
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.gates.is_enabled()
    }

    /// In offline mode records keep accumulating durably but no network
    /// calls are made until the mode is lifted.
    pub fn set_offline_mode(&self, offline: bool) {
        info!("offline mode {}", if offline { "on" } else { "off" });
        self.inner.gates.set_offline(offline);
        self.inner.wake.notify_one();
    }

    pub fn on_pause(&self) {
        self.inner.session.on_pause();
        self.inner.gates.set_paused(true);
    }

    pub fn on_resume(&self) {
        self.inner.gates.set_paused(false);
        self.inner.session.on_resume();
        self.inner.wake.notify_one();
    }

    /// Push token forwarded with every subsequent record.
    pub fn set_device_token(&self, token: &str) {
        self.inner.pipeline.set_client_field("push_token", token);
    }

    /// Install referrer forwarded with every subsequent record.
    pub fn set_referrer(&self, referrer: &str) {
        self.inner.pipeline.set_client_field("referrer", referrer);
    }

    pub fn attribution(&self) -> Option<AttributionSnapshot> {
        self.inner.attribution.current()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.inner.session.phase()
    }

    pub fn device_id(&self) -> String {
        self.inner.pipeline.device_id().to_string()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    /// Stop the delivery worker, letting any in-flight batch resolve,
    /// bounded by a grace window. Queued state stays on disk for the next
    /// start.
    pub async fn shutdown(&self) -> Result<(), TrackerError> {
        info!("shutting down tracklet");
        self.inner.cancel.cancel();
        self.inner.wake.notify_one();

        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                error!("shutdown timed out waiting for the delivery worker");
                return Err(TrackerError::ShutdownTimeout);
            }
        }
        Ok(())
    }
}

static INSTANCE: RwLock<Option<Tracker>> = RwLock::new(None);

fn installed() -> Option<Tracker> {
    INSTANCE.read().clone()
}

/// Initialize the process-wide client exactly once. A second call is a
/// logged no-op, never a re-initialization.
pub async fn start(config: Config) -> Result<(), StartError> {
    if installed().is_some() {
        warn!("tracklet already started, ignoring start call");
        return Ok(());
    }

    let tracker = Tracker::start(config).await?;

    let duplicate = {
        let mut slot = INSTANCE.write();
        if slot.is_some() {
            Some(tracker)
        } else {
            *slot = Some(tracker);
            None
        }
    };

    if let Some(extra) = duplicate {
        warn!("tracklet already started, discarding duplicate start");
        let _ = extra.shutdown().await;
    }
    Ok(())
}

fn with_installed<R>(f: impl FnOnce(&Tracker) -> R) -> Result<R, TrackerError> {
    match installed() {
        Some(tracker) => Ok(f(&tracker)),
        None => {
            warn!("tracklet not started; call start() first");
            Err(TrackerError::NotStarted)
        }
    }
}

pub fn track_event(event: Event) -> Result<(), TrackerError> {
    with_installed(|t| t.track_event(event))?
}

pub fn track_ad_revenue(ad_revenue: AdRevenue) -> Result<(), TrackerError> {
    with_installed(|t| t.track_ad_revenue(ad_revenue))?
}

pub fn set_enabled(enabled: bool) -> Result<(), TrackerError> {
    with_installed(|t| t.set_enabled(enabled))
}

pub fn is_enabled() -> bool {
    installed().is_some_and(|t| t.is_enabled())
}

pub fn set_offline_mode(offline: bool) -> Result<(), TrackerError> {
    with_installed(|t| t.set_offline_mode(offline))
}

pub fn on_pause() -> Result<(), TrackerError> {
    with_installed(Tracker::on_pause)
}

pub fn on_resume() -> Result<(), TrackerError> {
    with_installed(Tracker::on_resume)
}

pub fn set_device_token(token: &str) -> Result<(), TrackerError> {
    with_installed(|t| t.set_device_token(token))
}

pub fn set_referrer(referrer: &str) -> Result<(), TrackerError> {
    with_installed(|t| t.set_referrer(referrer))
}

pub fn attribution() -> Option<AttributionSnapshot> {
    installed().and_then(|t| t.attribution())
}

/// Tear down the process-wide client. The durable queue survives for the
/// next start.
pub async fn shutdown() -> Result<(), TrackerError> {
    let tracker = INSTANCE.write().take();
    match tracker {
        Some(tracker) => tracker.shutdown().await,
        None => {
            warn!("tracklet not started; nothing to shut down");
            Err(TrackerError::NotStarted)
        }
    }
}

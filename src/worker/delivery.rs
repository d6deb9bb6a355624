use super::retry::BackoffPolicy;
use crate::attribution::AttributionTracker;
use crate::client::callbacks::CallbackRegistry;
use crate::queue::{PersistentQueue, QueueEntry};
use crate::sender::{Transport, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suspension gates checked before every delivery attempt.
///
/// Flipping a gate takes effect before the next batch starts; a batch
/// already in flight completes or fails normally.
#[derive(Debug)]
pub struct WorkerGates {
    enabled: AtomicBool,
    offline: AtomicBool,
    paused: AtomicBool,
}

impl WorkerGates {
    pub fn new(enabled: bool, offline: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            offline: AtomicBool::new(offline),
            paused: AtomicBool::new(false),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// True when the worker may start a new delivery attempt.
    pub fn is_open(&self) -> bool {
        self.is_enabled() && !self.is_offline() && !self.is_paused()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Batch cap when event buffering is on.
    pub batch_max: usize,
    /// Accumulation window before a buffered batch is formed.
    pub flush_interval: Duration,
    /// Hard timeout on one delivery attempt; expiry counts as transient.
    pub send_timeout: Duration,
    pub event_buffering: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_max: 100,
            flush_interval: Duration::from_millis(500),
            send_timeout: Duration::from_secs(30),
            event_buffering: false,
        }
    }
}

/// Single background task draining the queue toward the collector.
///
/// At most one batch is outstanding at any time, which together with the
/// queue's FIFO peek keeps wire order identical to enqueue order.
pub struct DeliveryWorker {
    queue: Arc<PersistentQueue>,
    transport: Arc<dyn Transport>,
    backoff: BackoffPolicy,
    callbacks: Arc<CallbackRegistry>,
    attribution: Arc<AttributionTracker>,
    gates: Arc<WorkerGates>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    config: WorkerConfig,
}

impl DeliveryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<PersistentQueue>,
        transport: Arc<dyn Transport>,
        backoff: BackoffPolicy,
        callbacks: Arc<CallbackRegistry>,
        attribution: Arc<AttributionTracker>,
        gates: Arc<WorkerGates>,
        wake: Arc<Notify>,
        cancel: CancellationToken,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            backoff,
            callbacks,
            attribution,
            gates,
            wake,
            cancel,
            config,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(
            "delivery worker started (endpoint: {})",
            self.transport.endpoint()
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if !self.gates.is_open() || self.queue.is_empty() {
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = self.cancel.cancelled() => break,
                }
                continue;
            }

            if self.config.event_buffering {
                // Accumulation window so several events share one request.
                tokio::select! {
                    _ = sleep(self.config.flush_interval) => {}
                    _ = self.cancel.cancelled() => break,
                }
                if !self.gates.is_open() {
                    continue;
                }
            }

            let batch = self.queue.peek_batch(self.batch_limit());
            if batch.is_empty() {
                continue;
            }
            self.deliver(batch).await;
        }

        info!("delivery worker stopped");
    }

    fn batch_limit(&self) -> usize {
        if self.config.event_buffering {
            self.config.batch_max
        } else {
            1
        }
    }

    async fn deliver(&self, batch: Vec<QueueEntry>) {
        let outcome = match timeout(self.config.send_timeout, self.transport.send(&batch)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Transient(
                "delivery attempt timed out".to_string(),
            )),
        };

        match outcome {
            Ok(response) => {
                debug!("delivered batch of {} records", batch.len());
                for entry in &batch {
                    self.queue.acknowledge(entry.entry_id());
                    self.callbacks.notify_delivered(entry, &response);
                }
                if let Some(raw) = &response.attribution {
                    match self.attribution.update(raw) {
                        Ok(Some(snapshot)) => {
                            self.callbacks.notify_attribution_changed(&snapshot);
                        }
                        Ok(None) => {}
                        Err(e) => warn!("ignoring malformed attribution payload: {e}"),
                    }
                }
            }
            Err(TransportError::Transient(reason)) => {
                warn!(
                    "transient delivery failure for {} records: {reason}",
                    batch.len()
                );
                let mut highest_retry = 0;
                for entry in &batch {
                    self.queue.requeue(entry.entry_id());
                    highest_retry = highest_retry.max(entry.retry_count() + 1);
                    self.callbacks.notify_failed(entry, &reason, true);
                }
                let delay = self.backoff.delay_for(highest_retry);
                debug!("backing off for {delay:?} before next attempt");
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
            Err(TransportError::Permanent { status, message }) => {
                warn!(
                    "permanent delivery failure (HTTP {status}) for {} records: {message}",
                    batch.len()
                );
                let reason = format!("HTTP {status}: {message}");
                for entry in &batch {
                    self.queue.mark_failed(entry.entry_id());
                    self.callbacks.notify_failed(entry, &reason, false);
                }
            }
        }
    }
}

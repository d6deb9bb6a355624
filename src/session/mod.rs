//! Session lifecycle: foreground/background transitions folded into a
//! NoSession/Active/Finalizing state machine with an inactivity timer.
//! Brief backgrounding counts as the same session.

use crate::domain::RecordKind;
use crate::queue::RecordPipeline;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoSession,
    Active,
    Finalizing,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::Active => "active",
            Self::Finalizing => "finalizing",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Background time after which a session is finalized.
    pub inactivity_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold: Duration::from_secs(30 * 60),
        }
    }
}

struct SessionInner {
    phase: SessionPhase,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    paused_at: Option<Instant>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Session state machine.
///
/// NoSession -> Active on first resume (SessionStart enqueued). Pause moves
/// Active -> Finalizing and arms the inactivity timer; resuming before the
/// threshold returns to Active with no SessionEnd, while timer expiry
/// enqueues exactly one SessionEnd and returns to NoSession. The generation
/// counter invalidates stale timers.
pub struct SessionManager {
    inner: Mutex<SessionInner>,
    config: SessionConfig,
    pipeline: Arc<RecordPipeline>,
    runtime: tokio::runtime::Handle,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        pipeline: Arc<RecordPipeline>,
        runtime: tokio::runtime::Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::NoSession,
                session_id: None,
                started_at: None,
                last_activity: None,
                paused_at: None,
                generation: 0,
                timer: None,
            }),
            config,
            pipeline,
            runtime,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    pub fn current_session(&self) -> Option<Uuid> {
        self.inner.lock().session_id
    }

    /// Refresh the activity timestamp of an active session.
    pub fn record_activity(&self) {
        let mut inner = self.inner.lock();
        if inner.phase == SessionPhase::Active {
            inner.last_activity = Some(Utc::now());
        }
    }

    pub fn on_resume(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        match inner.phase {
            SessionPhase::NoSession => self.start_session_locked(&mut inner),
            SessionPhase::Active => {
                inner.last_activity = Some(Utc::now());
            }
            SessionPhase::Finalizing => {
                let expired = inner
                    .paused_at
                    .is_none_or(|t| t.elapsed() >= self.config.inactivity_threshold);
                if expired {
                    // The timer lost the race; finalize before the new session.
                    self.finalize_locked(&mut inner);
                    self.start_session_locked(&mut inner);
                } else {
                    inner.phase = SessionPhase::Active;
                    inner.last_activity = Some(Utc::now());
                    debug!("resumed within inactivity threshold, session continues");
                }
            }
        }
    }

    pub fn on_pause(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Active {
            debug!("pause with no active session ({})", inner.phase);
            return;
        }

        inner.phase = SessionPhase::Finalizing;
        inner.paused_at = Some(Instant::now());
        inner.generation += 1;

        let generation = inner.generation;
        let threshold = self.config.inactivity_threshold;
        let weak = Arc::downgrade(self);
        inner.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(threshold).await;
            if let Some(manager) = weak.upgrade() {
                manager.finalize_if(generation);
            }
        }));
    }

    fn finalize_if(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.phase == SessionPhase::Finalizing && inner.generation == generation {
            self.finalize_locked(&mut inner);
        }
    }

    fn start_session_locked(&self, inner: &mut SessionInner) {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        inner.session_id = Some(session_id);
        inner.started_at = Some(now);
        inner.last_activity = Some(now);
        inner.paused_at = None;
        inner.phase = SessionPhase::Active;

        let mut payload = HashMap::new();
        payload.insert("session_id".to_string(), session_id.to_string());
        if let Err(e) = self.pipeline.submit(RecordKind::SessionStart, payload) {
            warn!("failed to enqueue session start: {e}");
        }
        debug!("session {session_id} started");
    }

    fn finalize_locked(&self, inner: &mut SessionInner) {
        inner.phase = SessionPhase::NoSession;
        inner.paused_at = None;
        let Some(session_id) = inner.session_id.take() else {
            return;
        };

        let mut payload = HashMap::new();
        payload.insert("session_id".to_string(), session_id.to_string());
        if let (Some(started), Some(last)) = (inner.started_at.take(), inner.last_activity) {
            let length = (last - started).num_seconds().max(0);
            payload.insert("session_length".to_string(), length.to_string());
        }
        if let Err(e) = self.pipeline.submit(RecordKind::SessionEnd, payload) {
            warn!("failed to enqueue session end: {e}");
        }
        debug!("session {session_id} finalized");
    }
}

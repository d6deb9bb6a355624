use crate::domain::{AttributionSnapshot, RecordId};
use crate::queue::QueueEntry;
use crate::sender::CollectorResponse;
use std::sync::Arc;

/// Resolution data for a delivered event record.
#[derive(Debug, Clone)]
pub struct EventSuccess {
    pub record_id: RecordId,
    pub event_token: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub adid: Option<String>,
    pub json_response: serde_json::Value,
}

/// Resolution data for a failed event delivery attempt. `will_retry` is
/// true for transient failures that stay queued.
#[derive(Debug, Clone)]
pub struct EventFailure {
    pub record_id: RecordId,
    pub event_token: Option<String>,
    pub reason: String,
    pub will_retry: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSuccess {
    pub record_id: RecordId,
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub adid: Option<String>,
    pub json_response: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SessionFailure {
    pub record_id: RecordId,
    pub reason: String,
    pub will_retry: bool,
}

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Optional application callbacks, each invoked from the delivery worker's
/// task — never assume the caller's original thread. Success and permanent
/// failure fire at most once per record; transient failures fire once per
/// attempt with `will_retry` set.
#[derive(Default, Clone)]
pub struct CallbackRegistry {
    event_success: Option<Handler<EventSuccess>>,
    event_failure: Option<Handler<EventFailure>>,
    session_success: Option<Handler<SessionSuccess>>,
    session_failure: Option<Handler<SessionFailure>>,
    attribution_changed: Option<Handler<AttributionSnapshot>>,
}

impl CallbackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_event_success<F>(&mut self, handler: F)
    where
        F: Fn(EventSuccess) + Send + Sync + 'static,
    {
        self.event_success = Some(Arc::new(handler));
    }

    pub fn set_event_failure<F>(&mut self, handler: F)
    where
        F: Fn(EventFailure) + Send + Sync + 'static,
    {
        self.event_failure = Some(Arc::new(handler));
    }

    pub fn set_session_success<F>(&mut self, handler: F)
    where
        F: Fn(SessionSuccess) + Send + Sync + 'static,
    {
        self.session_success = Some(Arc::new(handler));
    }

    pub fn set_session_failure<F>(&mut self, handler: F)
    where
        F: Fn(SessionFailure) + Send + Sync + 'static,
    {
        self.session_failure = Some(Arc::new(handler));
    }

    pub fn set_attribution_changed<F>(&mut self, handler: F)
    where
        F: Fn(AttributionSnapshot) + Send + Sync + 'static,
    {
        self.attribution_changed = Some(Arc::new(handler));
    }

    pub(crate) fn notify_delivered(&self, entry: &QueueEntry, response: &CollectorResponse) {
        let record = entry.record();
        if record.kind().is_session() {
            if let Some(handler) = &self.session_success {
                handler(SessionSuccess {
                    record_id: record.id().clone(),
                    message: response.message.clone(),
                    timestamp: response.timestamp.clone(),
                    adid: response.adid.clone(),
                    json_response: response.raw.clone(),
                });
            }
        } else if let Some(handler) = &self.event_success {
            handler(EventSuccess {
                record_id: record.id().clone(),
                event_token: record.event_token().map(str::to_string),
                message: response.message.clone(),
                timestamp: response.timestamp.clone(),
                adid: response.adid.clone(),
                json_response: response.raw.clone(),
            });
        }
    }

    pub(crate) fn notify_failed(&self, entry: &QueueEntry, reason: &str, will_retry: bool) {
        let record = entry.record();
        if record.kind().is_session() {
            if let Some(handler) = &self.session_failure {
                handler(SessionFailure {
                    record_id: record.id().clone(),
                    reason: reason.to_string(),
                    will_retry,
                });
            }
        } else if let Some(handler) = &self.event_failure {
            handler(EventFailure {
                record_id: record.id().clone(),
                event_token: record.event_token().map(str::to_string),
                reason: reason.to_string(),
                will_retry,
            });
        }
    }

    pub(crate) fn notify_attribution_changed(&self, snapshot: &AttributionSnapshot) {
        if let Some(handler) = &self.attribution_changed {
            handler(snapshot.clone());
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("event_success", &self.event_success.is_some())
            .field("event_failure", &self.event_failure.is_some())
            .field("session_success", &self.session_success.is_some())
            .field("session_failure", &self.session_failure.is_some())
            .field("attribution_changed", &self.attribution_changed.is_some())
            .finish()
    }
}

//! Attribution state: the latest snapshot from the collector and detection
//! of changes worth surfacing to the application.

use crate::domain::AttributionSnapshot;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed attribution payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Holds the current attribution snapshot, initially empty.
///
/// `update` replaces the snapshot atomically only when the candidate
/// differs structurally from the current one; parse failures never mutate
/// state.
#[derive(Debug, Default)]
pub struct AttributionTracker {
    current: RwLock<Option<AttributionSnapshot>>,
}

impl AttributionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<AttributionSnapshot> {
        self.current.read().clone()
    }

    /// Parse a raw collector payload into a candidate snapshot. Returns the
    /// new snapshot when it differs from the current one, `None` when the
    /// attribution is unchanged.
    pub fn update(
        &self,
        raw: &serde_json::Value,
    ) -> Result<Option<AttributionSnapshot>, ParseError> {
        let candidate: AttributionSnapshot = serde_json::from_value(raw.clone())?;

        let mut current = self.current.write();
        if current.as_ref() == Some(&candidate) {
            return Ok(None);
        }
        *current = Some(candidate.clone());
        Ok(Some(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_update_reports_change() {
        let tracker = AttributionTracker::new();
        let raw = json!({"trackerToken": "abc123", "network": "Organic"});

        let changed = tracker.update(&raw).unwrap();
        assert!(changed.is_some());
        assert_eq!(
            tracker.current().unwrap().tracker_token.as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn identical_update_is_silent() {
        let tracker = AttributionTracker::new();
        let raw = json!({"trackerToken": "abc123", "campaign": "launch"});

        assert!(tracker.update(&raw).unwrap().is_some());
        assert!(tracker.update(&raw).unwrap().is_none());
    }

    #[test]
    fn parse_failure_leaves_state_untouched() {
        let tracker = AttributionTracker::new();
        let good = json!({"trackerToken": "abc123"});
        tracker.update(&good).unwrap();

        let bad = json!({"trackerToken": 42});
        assert!(tracker.update(&bad).is_err());
        assert_eq!(
            tracker.current().unwrap().tracker_token.as_deref(),
            Some("abc123")
        );
    }
}

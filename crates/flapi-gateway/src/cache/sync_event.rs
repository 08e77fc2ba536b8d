//! Sync-event recording: an audit trail of cache refresh attempts, kept
//! separate from ordinary log output so that refresh history can be
//! queried per endpoint (spec §4.5 step 5).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::cache::CacheMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub endpoint: String,
    pub mode: CacheMode,
    pub status: SyncStatus,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// In-memory log of [`SyncEvent`]s. Recording never fails: a broken audit
/// trail must not take down a refresh that otherwise succeeded.
#[derive(Default)]
pub struct SyncEventLog {
    events: Mutex<Vec<SyncEvent>>,
}

impl SyncEventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: SyncEvent) {
        match event.status {
            SyncStatus::Success => {
                tracing::info!(endpoint = %event.endpoint, mode = ?event.mode, "cache refresh succeeded");
            }
            SyncStatus::Error => {
                tracing::warn!(endpoint = %event.endpoint, mode = ?event.mode, message = %event.message, "cache refresh failed");
            }
        }
        self.events.lock().push(event);
    }

    #[must_use]
    pub fn events_for(&self, endpoint: &str) -> Vec<SyncEvent> {
        self.events.lock().iter().filter(|e| e.endpoint == endpoint).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_never_panics_and_is_queryable_by_endpoint() {
        let log = SyncEventLog::new();
        log.record(SyncEvent {
            endpoint: "orders".to_string(),
            mode: CacheMode::Append,
            status: SyncStatus::Success,
            message: "wrote 3 rows".to_string(),
            occurred_at: Utc::now(),
        });
        log.record(SyncEvent {
            endpoint: "customers".to_string(),
            mode: CacheMode::Full,
            status: SyncStatus::Error,
            message: "connection refused".to_string(),
            occurred_at: Utc::now(),
        });

        let orders_events = log.events_for("orders");
        assert_eq!(orders_events.len(), 1);
        assert_eq!(orders_events[0].status, SyncStatus::Success);
    }
}

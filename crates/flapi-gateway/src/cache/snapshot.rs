//! Snapshot catalog: the last known cursor position per cache-enabled
//! endpoint, read at the start of each refresh and advanced after a
//! successful one (spec §4.5 step 1, GLOSSARY "Snapshot catalog").
//!
//! Grounded on `test/cpp/cache_manager_test.cpp`'s snapshot-read-failure
//! behavior: a missing or unreadable entry falls back to an empty
//! [`SnapshotInfo`] rather than failing the refresh.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

/// Last known snapshot position for one cache-enabled endpoint.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInfo {
    pub snapshot_id: u64,
    pub snapshot_time: Option<DateTime<Utc>>,
    pub cursor_value: Option<Value>,
}

/// In-memory snapshot catalog keyed by endpoint. Stands in for the query
/// engine's time-travel metadata store; a Postgres-backed gateway has no
/// engine-managed snapshot history of its own, so this tracks the
/// equivalent bookkeeping directly.
#[derive(Default)]
pub struct SnapshotCatalog {
    entries: Mutex<HashMap<String, SnapshotInfo>>,
}

impl SnapshotCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the last snapshot for `endpoint_key`, defaulting to an empty
    /// one when absent.
    #[must_use]
    pub fn last_snapshot(&self, endpoint_key: &str) -> SnapshotInfo {
        self.entries.lock().get(endpoint_key).cloned().unwrap_or_default()
    }

    /// Records a new snapshot for `endpoint_key`, advancing its
    /// `snapshot_id`.
    pub fn record(&self, endpoint_key: &str, cursor_value: Option<Value>, at: DateTime<Utc>) {
        let mut entries = self.entries.lock();
        let next_id = entries.get(endpoint_key).map_or(1, |s| s.snapshot_id + 1);
        entries.insert(
            endpoint_key.to_string(),
            SnapshotInfo { snapshot_id: next_id, snapshot_time: Some(at), cursor_value },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_endpoint_yields_empty_snapshot_info() {
        let catalog = SnapshotCatalog::new();
        let info = catalog.last_snapshot("orders");
        assert_eq!(info.snapshot_id, 0);
        assert!(info.cursor_value.is_none());
    }

    #[test]
    fn recording_advances_snapshot_id() {
        let catalog = SnapshotCatalog::new();
        catalog.record("orders", Some(Value::from(10)), Utc::now());
        catalog.record("orders", Some(Value::from(20)), Utc::now());
        let info = catalog.last_snapshot("orders");
        assert_eq!(info.snapshot_id, 2);
        assert_eq!(info.cursor_value, Some(Value::from(20)));
    }
}

//! Cache Manager: scheduled refresh of materialized endpoint result sets
//! (spec §4.5).
//!
//! Schedule-string parsing is grounded on
//! `fraiseql-runtime::config::env::parse_duration`'s suffix dispatch.

pub mod refresh;
pub mod scheduler;
pub mod snapshot;
pub mod sync_event;

pub use refresh::{CacheRefreshOutcome, CacheRefresher};
pub use scheduler::CacheScheduler;
pub use snapshot::{SnapshotCatalog, SnapshotInfo};
pub use sync_event::{SyncEvent, SyncEventLog, SyncStatus};

use std::time::Duration;

use flapi_error::GatewayError;

/// How a cache table is populated on each refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Truncate and reload the whole table.
    Full,
    /// Only insert rows newer than the last cursor value.
    Append,
    /// Upsert by primary key, updating existing rows and inserting new ones.
    Merge,
}

impl CacheMode {
    /// A cursor column is required for `Append` and `Merge`, optional for
    /// `Full` (spec §4.5 invariant).
    #[must_use]
    pub const fn requires_cursor(self) -> bool {
        matches!(self, Self::Append | Self::Merge)
    }

    /// The `cacheMode` template-parameter spelling (spec §4.5 step 2).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Append => "append",
            Self::Merge => "merge",
        }
    }
}

/// Selects the cache mode an endpoint's configuration implies: `Merge` when
/// primary keys are declared, `Append` when only a cursor is declared,
/// `Full` otherwise.
#[must_use]
pub fn select_mode(has_primary_keys: bool, has_cursor: bool) -> CacheMode {
    if has_primary_keys {
        CacheMode::Merge
    } else if has_cursor {
        CacheMode::Append
    } else {
        CacheMode::Full
    }
}

/// Parses schedule strings like `"30s"`, `"5m"`, `"1h"`, `"1d"` into a
/// `Duration`.
pub fn parse_schedule(schedule: &str) -> Result<Duration, GatewayError> {
    let trimmed = schedule.trim();
    let (num_str, multiplier_secs) = if let Some(stripped) = trimmed.strip_suffix('s') {
        (stripped, 1u64)
    } else if let Some(stripped) = trimmed.strip_suffix('m') {
        (stripped, 60)
    } else if let Some(stripped) = trimmed.strip_suffix('h') {
        (stripped, 3600)
    } else if let Some(stripped) = trimmed.strip_suffix('d') {
        (stripped, 86400)
    } else {
        return Err(GatewayError::configuration(format!(
            "invalid cache schedule '{schedule}': missing unit (s, m, h, d)"
        )));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| GatewayError::configuration(format!("invalid cache schedule '{schedule}': not a number")))?;

    Ok(Duration::from_secs(num * multiplier_secs))
}

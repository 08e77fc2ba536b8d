//! VFS health checking: probes every configured storage backend at startup
//! and on demand, feeding the `/mcp/health` endpoint (spec §4.16, §6).

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::vfs::FileProvider;

#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub name: String,
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub backends: Vec<BackendHealth>,
}

impl HealthReport {
    #[must_use]
    pub fn all_healthy(&self) -> bool {
        self.backends.iter().all(|b| b.healthy)
    }
}

/// Probes a fixed set of named storage backends by checking whether a
/// caller-supplied probe path exists.
pub struct HealthChecker {
    providers: Vec<(String, Arc<dyn FileProvider>)>,
}

impl HealthChecker {
    #[must_use]
    pub fn new(providers: Vec<(String, Arc<dyn FileProvider>)>) -> Self {
        Self { providers }
    }

    /// Runs `file_exists(probe_path)` against every backend and reports
    /// latency and any error, without failing the whole check if one
    /// backend is unreachable.
    pub async fn check_all(&self, probe_path: &str) -> HealthReport {
        let mut backends = Vec::with_capacity(self.providers.len());
        for (name, provider) in &self.providers {
            let start = Instant::now();
            let result = provider.file_exists(probe_path).await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (healthy, error) = match result {
                Ok(_) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };

            backends.push(BackendHealth { name: name.clone(), healthy, latency_ms, error });
        }

        HealthReport { checked_at: Utc::now(), backends }
    }
}

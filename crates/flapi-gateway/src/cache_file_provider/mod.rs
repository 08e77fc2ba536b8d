//! TTL + byte-bounded LRU decorator over a [`FileProvider`] (spec §4.6).
//!
//! Caches only remote reads. `file_exists`/`list_files` are never cached —
//! freshness matters more than avoiding the round trip for those calls.
//! Cache operations are serialized by a single mutex; stat counters use
//! relaxed atomics, matching the concurrency model in spec §5.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use flapi_error::GatewayError;
use parking_lot::Mutex;

use crate::vfs::{is_remote, FileProvider};

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Instant,
    last_access: Instant,
}

/// Monotonic (except current-*) counters per spec §3's `CacheStats`.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub current_entries: AtomicU64,
    pub current_size_bytes: AtomicU64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_entries: self.current_entries.load(Ordering::Relaxed),
            current_size_bytes: self.current_size_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_entries: u64,
    pub current_size_bytes: u64,
}

pub struct CachingFileProvider {
    inner: Arc<dyn FileProvider>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_size_bytes: u64,
    stats: CacheStats,
    enabled: bool,
}

impl CachingFileProvider {
    #[must_use]
    pub fn new(inner: Arc<dyn FileProvider>, ttl: Duration, max_size_bytes: u64) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_size_bytes,
            stats: CacheStats::default(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Evicts least-recently-accessed entries until `incoming_size` plus the
    /// remaining total fits within `max_size_bytes`.
    fn evict_to_fit(entries: &mut HashMap<String, CacheEntry>, stats: &CacheStats, max: u64, incoming_size: u64) {
        if incoming_size > max {
            return;
        }
        let mut total: u64 = entries.values().map(|e| e.bytes.len() as u64).sum();
        while total + incoming_size > max {
            let Some(lru_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(removed) = entries.remove(&lru_key) {
                total -= removed.bytes.len() as u64;
                stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        stats.current_entries.store(entries.len() as u64, Ordering::Relaxed);
        stats.current_size_bytes.store(total, Ordering::Relaxed);
    }
}

#[async_trait]
impl FileProvider for CachingFileProvider {
    fn name(&self) -> &'static str {
        "caching"
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        if !self.enabled || !is_remote(path) {
            return self.inner.read_file(path).await;
        }

        let now = Instant::now();
        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(path) {
                if entry.expires_at > now {
                    entry.last_access = now;
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.bytes.clone());
                }
                entries.remove(path);
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let content = self.inner.read_file(path).await?;

        let size = content.len() as u64;
        if size <= self.max_size_bytes {
            let mut entries = self.entries.lock();
            Self::evict_to_fit(&mut entries, &self.stats, self.max_size_bytes, size);
            entries.insert(
                path.to_string(),
                CacheEntry {
                    bytes: content.clone(),
                    expires_at: now + self.ttl,
                    last_access: now,
                },
            );
            self.stats.current_entries.store(entries.len() as u64, Ordering::Relaxed);
            let total: u64 = entries.values().map(|e| e.bytes.len() as u64).sum();
            self.stats.current_size_bytes.store(total, Ordering::Relaxed);
        }

        Ok(content)
    }

    async fn file_exists(&self, path: &str) -> Result<bool, GatewayError> {
        self.inner.file_exists(path).await
    }

    async fn list_files(&self, path: &str, glob: &str) -> Result<Vec<String>, GatewayError> {
        self.inner.list_files(path, glob).await
    }
}

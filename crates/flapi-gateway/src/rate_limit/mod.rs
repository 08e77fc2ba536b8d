//! Per-endpoint rate limiting: token-bucket or fixed-window (spec §4.12).
//!
//! Grounded on `fraiseql-server::middleware::rate_limit`'s token-bucket
//! shape, keyed here by authenticated username (falling back to remote
//! address) instead of IP-only.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    TokenBucket,
    FixedWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_strategy")]
    pub strategy: RateLimitStrategy,
    pub max: u32,
    pub interval_seconds: u64,
}

fn default_strategy() -> RateLimitStrategy {
    RateLimitStrategy::TokenBucket
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { tokens: capacity, capacity, refill_per_sec, last_refill: Instant::now() }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct FixedWindow {
    count: u32,
    window_start: Instant,
}

enum Limiter {
    Bucket(TokenBucket),
    Window(FixedWindow),
}

/// Per-endpoint limiter state, keyed by authenticated username or remote
/// address (spec §4.12: "Keyed by authenticated username when present,
/// else by remote address").
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<HashMap<String, Limiter>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, state: Mutex::new(HashMap::new()) }
    }

    /// `true` if the request is allowed; `false` if it should be rejected
    /// with 429.
    #[must_use]
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut state = self.state.lock();
        let limiter = state.entry(key.to_string()).or_insert_with(|| match self.config.strategy {
            RateLimitStrategy::TokenBucket => {
                let refill = self.config.max as f64 / self.config.interval_seconds.max(1) as f64;
                Limiter::Bucket(TokenBucket::new(self.config.max as f64, refill))
            }
            RateLimitStrategy::FixedWindow => {
                Limiter::Window(FixedWindow { count: 0, window_start: now })
            }
        });

        match limiter {
            Limiter::Bucket(bucket) => bucket.try_consume(now),
            Limiter::Window(window) => {
                let window_len = Duration::from_secs(self.config.interval_seconds.max(1));
                if now.saturating_duration_since(window.window_start) >= window_len {
                    window.window_start = now;
                    window.count = 0;
                }
                if window.count < self.config.max {
                    window.count += 1;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// The identity to rate-limit by: authenticated username, else remote
/// address.
#[must_use]
pub fn rate_limit_key(username: Option<&str>, remote_addr: &str) -> String {
    username.map_or_else(|| remote_addr.to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_config(max: u32, interval: u64) -> RateLimitConfig {
        RateLimitConfig { enabled: true, strategy: RateLimitStrategy::TokenBucket, max, interval_seconds: interval }
    }

    #[test]
    fn token_bucket_rejects_after_capacity_exhausted() {
        let limiter = RateLimiter::new(bucket_config(3, 60));
        let now = Instant::now();
        assert!(limiter.check_at("u1", now));
        assert!(limiter.check_at("u1", now));
        assert!(limiter.check_at("u1", now));
        assert!(!limiter.check_at("u1", now));
    }

    #[test]
    fn token_bucket_refills_over_time() {
        let limiter = RateLimiter::new(bucket_config(1, 1));
        let now = Instant::now();
        assert!(limiter.check_at("u1", now));
        assert!(!limiter.check_at("u1", now));
        assert!(limiter.check_at("u1", now + Duration::from_secs(2)));
    }

    #[test]
    fn fixed_window_resets_after_interval() {
        let config = RateLimitConfig {
            enabled: true,
            strategy: RateLimitStrategy::FixedWindow,
            max: 2,
            interval_seconds: 1,
        };
        let limiter = RateLimiter::new(config);
        let now = Instant::now();
        assert!(limiter.check_at("u1", now));
        assert!(limiter.check_at("u1", now));
        assert!(!limiter.check_at("u1", now));
        assert!(limiter.check_at("u1", now + Duration::from_secs(2)));
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            strategy: RateLimitStrategy::TokenBucket,
            max: 1,
            interval_seconds: 60,
        });
        for _ in 0..10 {
            assert!(limiter.check("anyone"));
        }
    }

    #[test]
    fn keys_are_independent_per_principal() {
        let limiter = RateLimiter::new(bucket_config(1, 60));
        let now = Instant::now();
        assert!(limiter.check_at("alice", now));
        assert!(limiter.check_at("bob", now));
        assert!(!limiter.check_at("alice", now));
    }

    #[test]
    fn rate_limit_key_prefers_username() {
        assert_eq!(rate_limit_key(Some("alice"), "127.0.0.1"), "alice");
        assert_eq!(rate_limit_key(None, "127.0.0.1"), "127.0.0.1");
    }
}

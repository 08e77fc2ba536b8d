//! MCP session management: 96-bit session ids, idle-timeout eviction, and
//! OIDC refresh awareness (spec §4.10, §3).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::RngCore;

use crate::auth::AuthContext;
use crate::mcp::capabilities::McpClientCapabilities;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const TOKEN_REFRESH_LEAD_MINUTES: i64 = 5;

/// Generates a 96-bit session id as 24 lowercase hex characters.
#[must_use]
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub auth: AuthContext,
    pub capabilities: McpClientCapabilities,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Session {
    fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= idle_timeout
    }

    /// `true` when the bound OIDC token's `exp` has already passed, meaning
    /// the session must re-authenticate rather than be refreshed silently.
    #[must_use]
    pub fn token_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.auth.token_expires_at.is_some_and(|exp| exp <= now)
    }

    /// `true` when the bound OIDC token's `exp` is within the refresh lead
    /// time, meaning the session should proactively refresh rather than
    /// wait for a hard expiry (spec §4.11).
    #[must_use]
    pub fn needs_token_refresh(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.auth
            .token_expires_at
            .is_some_and(|exp| now >= exp - chrono::Duration::minutes(TOKEN_REFRESH_LEAD_MINUTES))
    }
}

/// Keyed store of live MCP sessions with idle-timeout sweeping.
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: DashMap::new(), idle_timeout: DEFAULT_IDLE_TIMEOUT }
    }

    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self { sessions: DashMap::new(), idle_timeout }
    }

    /// Creates a new session bound to `auth`, returning its id.
    pub fn create(&self, auth: AuthContext) -> String {
        let id = generate_session_id();
        let now = Instant::now();
        self.sessions.insert(
            id.clone(),
            Session { id: id.clone(), auth, capabilities: McpClientCapabilities::default(), created_at: now, last_activity: now },
        );
        id
    }

    /// Attaches client capabilities detected from `initialize` to an
    /// already-created session. A no-op if the session no longer exists.
    pub fn set_capabilities(&self, id: &str, capabilities: McpClientCapabilities) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.capabilities = capabilities;
        }
    }

    /// Looks up a session by id, refreshing its activity timestamp. Returns
    /// `None` for unknown or idle-expired sessions (the latter is evicted).
    pub fn touch(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        let mut expired = false;
        let result = self.sessions.get_mut(id).and_then(|mut entry| {
            if entry.is_idle(now, self.idle_timeout) {
                expired = true;
                None
            } else {
                entry.last_activity = now;
                Some(entry.clone())
            }
        });

        if expired {
            self.sessions.remove(id);
        }
        result
    }

    /// Removes and returns every session idle longer than the configured
    /// timeout, for periodic sweeping.
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_idle(now, self.idle_timeout))
            .map(|entry| entry.id.clone())
            .collect();

        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_24_hex_chars_and_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn touch_returns_session_and_refreshes_activity() {
        let manager = SessionManager::new();
        let id = manager.create(AuthContext::anonymous());
        assert!(manager.touch(&id).is_some());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn unknown_session_id_returns_none() {
        let manager = SessionManager::new();
        assert!(manager.touch("does-not-exist").is_none());
    }

    #[test]
    fn sweep_expired_evicts_idle_sessions() {
        let manager = SessionManager::with_idle_timeout(Duration::from_millis(1));
        let id = manager.create(AuthContext::anonymous());
        std::thread::sleep(Duration::from_millis(5));
        let expired = manager.sweep_expired();
        assert_eq!(expired, vec![id]);
        assert!(manager.is_empty());
    }

    #[test]
    fn token_expired_checks_auth_context_exp() {
        let mut auth = AuthContext::anonymous();
        auth.token_expires_at = Some(chrono::Utc::now() - chrono::Duration::seconds(10));
        let session = Session {
            id: "x".into(),
            auth,
            capabilities: McpClientCapabilities::default(),
            created_at: Instant::now(),
            last_activity: Instant::now(),
        };
        assert!(session.token_expired(chrono::Utc::now()));
    }

    #[test]
    fn needs_token_refresh_fires_within_lead_time_but_not_before() {
        let mut auth = AuthContext::anonymous();
        auth.token_expires_at = Some(chrono::Utc::now() + chrono::Duration::minutes(3));
        let session = Session {
            id: "x".into(),
            auth,
            capabilities: McpClientCapabilities::default(),
            created_at: Instant::now(),
            last_activity: Instant::now(),
        };
        assert!(session.needs_token_refresh(chrono::Utc::now()));
        assert!(!session.token_expired(chrono::Utc::now()));
    }

    #[test]
    fn set_capabilities_attaches_to_existing_session() {
        let manager = SessionManager::new();
        let id = manager.create(AuthContext::anonymous());
        manager.set_capabilities(&id, McpClientCapabilities { supports_sampling: true, ..McpClientCapabilities::default() });
        let session = manager.touch(&id).unwrap();
        assert!(session.capabilities.supports_sampling);
    }
}

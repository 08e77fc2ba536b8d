//! Authentication middleware and authenticators (spec §4.3).
//!
//! Delegates to basic/bearer/OIDC strategies per endpoint `AuthConfig`.

pub mod basic;
pub mod bearer;
pub mod middleware;
pub mod oidc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The tag identifying which authenticator produced an `AuthContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Basic,
    Bearer,
    Oidc,
}

/// Per-principal record of identity, roles, and token binding (spec §3).
/// Immutable post-creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub authenticated: bool,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub auth_type: AuthType,
    pub auth_time: DateTime<Utc>,
    #[serde(default)]
    pub token_jti: Option<String>,
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl AuthContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            username: String::new(),
            roles: vec![],
            auth_type: AuthType::Basic,
            auth_time: Utc::now(),
            token_jti: None,
            token_expires_at: None,
            refresh_token: None,
        }
    }

    /// An MCP session is authenticated iff its `AuthContext` is present and
    /// `authenticated = true` (spec §3 invariant).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

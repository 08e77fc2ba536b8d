//! Global MCP auth configuration: gates which JSON-RPC methods require an
//! authenticated caller, independent of any per-endpoint `AuthConfig` (spec
//! §4.10 step 4). Grounded on `MCPAuthHandler::methodRequiresAuth` /
//! `authorizeMethod` / `authenticateBasic` in
//! `examples/original_source/src/mcp_auth_handler.cpp`, which models MCP
//! auth as one protocol-wide config rather than per-endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::auth::{basic, bearer, AuthContext};
use crate::endpoint::InlineUser;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub inline_users: Vec<InlineUser>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    /// Per-method override of whether auth is required; a method absent
    /// from this map falls back to `enabled`.
    #[serde(default)]
    pub methods: HashMap<String, bool>,
}

impl McpAuthConfig {
    /// `true` when `method` must be called by an authenticated caller.
    #[must_use]
    pub fn requires_auth(&self, method: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.methods.get(method).copied().unwrap_or(true)
    }

    /// `true` when `method` may proceed given `authenticated`.
    #[must_use]
    pub fn authorizes(&self, method: &str, authenticated: bool) -> bool {
        !self.requires_auth(method) || authenticated
    }

    /// Authenticates an `Authorization` header locally, trying Basic then
    /// Bearer — both synchronous, matching `authenticateBasic`/
    /// `authenticateBearer` in the original (OIDC-bound MCP sessions are
    /// instead carried forward via the session's existing `AuthContext`).
    #[must_use]
    pub fn authenticate_header(&self, header_value: &str) -> Option<AuthContext> {
        if let Some((username, password)) = basic::decode_basic_header(header_value) {
            return basic::authenticate(&username, &password, &self.inline_users, None);
        }

        let (scheme, token) = header_value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let secret = self.jwt_secret.as_deref()?;
        bearer::authenticate(token, secret, self.jwt_issuer.as_deref()).ok()
    }
}

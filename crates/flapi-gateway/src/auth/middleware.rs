//! Authentication orchestration across basic/bearer/OIDC (spec §4.3).
//!
//! Dispatches on an endpoint's `AuthConfig`, delegating to the matching
//! authenticator, and owns the external-secret bootstrap that pulls
//! credentials referenced by `external_secret_ref` into a local table once
//! at startup (grounded on `fraiseql-server::secrets_manager`'s catalog
//! pull).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use flapi_error::GatewayError;

use crate::auth::oidc::{DiscoveryClient, JwksManager};
use crate::auth::oidc::token::{validate_token, TokenValidationInput};
use crate::auth::{basic, bearer, AuthContext};
use crate::endpoint::{AuthConfig, AuthType};

/// Shared, long-lived collaborators the middleware needs across requests.
pub struct AuthServices {
    pub jwks: Arc<JwksManager>,
    pub discovery: Arc<DiscoveryClient>,
}

impl AuthServices {
    #[must_use]
    pub fn new() -> Self {
        let http = crate::http_client::default_http_client();
        Self { jwks: Arc::new(JwksManager::new(http.clone())), discovery: Arc::new(DiscoveryClient::new(http)) }
    }
}

impl Default for AuthServices {
    fn default() -> Self {
        Self::new()
    }
}

/// Caches secret catalog entries referenced by `external_secret_ref`,
/// fetched once per reference via the caller-supplied loader.
#[derive(Default)]
pub struct ExternalSecretStore {
    loaded: Mutex<HashMap<String, Arc<HashMap<String, String>>>>,
}

impl ExternalSecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table for `reference`, loading it via `loader` on
    /// first use.
    pub fn get_or_load(
        &self,
        reference: &str,
        loader: impl FnOnce() -> HashMap<String, String>,
    ) -> Arc<HashMap<String, String>> {
        let mut loaded = self.loaded.lock();
        loaded.entry(reference.to_string()).or_insert_with(|| Arc::new(loader())).clone()
    }
}

/// The `Authorization` header value, split into scheme and the rest.
fn split_scheme(header_value: &str) -> Option<(&str, &str)> {
    header_value.split_once(' ')
}

/// Authenticates a request per `auth_config`. Returns an anonymous context
/// when auth is disabled, `Ok` with a populated context on success, or an
/// `Authentication` error on failure (missing header, bad credentials,
/// invalid/expired token).
pub async fn authenticate(
    auth_config: &AuthConfig,
    authorization_header: Option<&str>,
    services: &AuthServices,
    external_secrets: Option<&HashMap<String, String>>,
) -> Result<AuthContext, GatewayError> {
    if !auth_config.enabled {
        return Ok(AuthContext::anonymous());
    }

    match auth_config.auth_type {
        AuthType::Basic => {
            let header = authorization_header
                .ok_or_else(|| GatewayError::authentication("missing Authorization header"))?;
            let (username, password) = basic::decode_basic_header(header)
                .ok_or_else(|| GatewayError::authentication("malformed Basic authorization header"))?;
            basic::authenticate(&username, &password, &auth_config.inline_users, external_secrets)
                .ok_or_else(|| GatewayError::authentication("invalid username or password"))
        }
        AuthType::Bearer => {
            let header = authorization_header
                .ok_or_else(|| GatewayError::authentication("missing Authorization header"))?;
            let (scheme, token) = split_scheme(header)
                .ok_or_else(|| GatewayError::authentication("malformed Authorization header"))?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return Err(GatewayError::authentication("expected a Bearer token"));
            }
            let secret = auth_config
                .jwt_secret
                .as_deref()
                .ok_or_else(|| GatewayError::configuration("bearer auth requires jwt_secret"))?;
            bearer::authenticate(token, secret, auth_config.jwt_issuer.as_deref())
                .map_err(GatewayError::authentication)
        }
        AuthType::Oidc => {
            let header = authorization_header
                .ok_or_else(|| GatewayError::authentication("missing Authorization header"))?;
            let (scheme, token) = split_scheme(header)
                .ok_or_else(|| GatewayError::authentication("malformed Authorization header"))?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return Err(GatewayError::authentication("expected a Bearer token"));
            }
            let oidc = auth_config
                .oidc
                .as_ref()
                .ok_or_else(|| GatewayError::configuration("oidc auth requires an oidc block"))?;

            let metadata = services.discovery.discover(&oidc.issuer).await?;
            let roles_claim = oidc.roles_claim.as_deref().unwrap_or("roles");

            let outcome = validate_token(
                TokenValidationInput {
                    token,
                    jwks_uri: &metadata.jwks_uri,
                    expected_issuer: &oidc.issuer,
                    allowed_audiences: &oidc.allowed_audiences,
                    clock_skew_seconds: oidc.clock_skew_seconds,
                    username_claim: &oidc.username_claim,
                    role_claim_path: oidc.role_claim_path.as_deref(),
                    roles_claim,
                },
                &services.jwks,
            )
            .await?;

            Ok(outcome.context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::InlineUser;

    fn basic_auth_config(users: Vec<InlineUser>) -> AuthConfig {
        AuthConfig {
            enabled: true,
            auth_type: AuthType::Basic,
            inline_users: users,
            jwt_secret: None,
            jwt_issuer: None,
            oidc: None,
            external_secret_ref: None,
        }
    }

    #[tokio::test]
    async fn disabled_auth_yields_anonymous_context() {
        let config = AuthConfig {
            enabled: false,
            auth_type: AuthType::Basic,
            inline_users: vec![],
            jwt_secret: None,
            jwt_issuer: None,
            oidc: None,
            external_secret_ref: None,
        };
        let services = AuthServices::new();
        let ctx = authenticate(&config, None, &services, None).await.unwrap();
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn basic_auth_missing_header_is_rejected() {
        let config = basic_auth_config(vec![InlineUser { username: "alice".into(), password: "hunter2".into() }]);
        let services = AuthServices::new();
        assert!(authenticate(&config, None, &services, None).await.is_err());
    }

    #[tokio::test]
    async fn basic_auth_valid_header_authenticates() {
        let config = basic_auth_config(vec![InlineUser { username: "alice".into(), password: "hunter2".into() }]);
        let services = AuthServices::new();
        // base64("alice:hunter2") = YWxpY2U6aHVudGVyMg==
        let ctx = authenticate(&config, Some("Basic YWxpY2U6aHVudGVyMg=="), &services, None).await.unwrap();
        assert_eq!(ctx.username, "alice");
        assert!(ctx.is_authenticated());
    }

    #[tokio::test]
    async fn bearer_without_secret_configured_is_a_configuration_error() {
        let config = AuthConfig {
            enabled: true,
            auth_type: AuthType::Bearer,
            inline_users: vec![],
            jwt_secret: None,
            jwt_issuer: None,
            oidc: None,
            external_secret_ref: None,
        };
        let services = AuthServices::new();
        let result = authenticate(&config, Some("Bearer abc.def.ghi"), &services, None).await;
        assert!(result.is_err());
    }

    #[test]
    fn external_secret_store_loads_once() {
        let store = ExternalSecretStore::new();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let load = || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            HashMap::from([("alice".to_string(), "secret".to_string())])
        };
        let first = store.get_or_load("catalog-ref", load);
        let second = store.get_or_load("catalog-ref", || HashMap::new());
        assert_eq!(first.get("alice"), second.get("alice"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

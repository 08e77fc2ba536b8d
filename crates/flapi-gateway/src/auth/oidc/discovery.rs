//! OIDC discovery client (spec §4.4).
//!
//! Fetches `${issuer}/.well-known/openid-configuration`, caches per-issuer
//! with a TTL (default 24h). Missing `issuer` or `jwks_uri` is a hard
//! failure, matching `fraiseql-server::auth::oidc_provider`'s discovery
//! fetch shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;

use flapi_error::GatewayError;

const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, Deserialize)]
pub struct OidcMetadata {
    pub issuer: String,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub jwks_uri: String,
    pub userinfo_endpoint: Option<String>,
}

struct CachedMetadata {
    metadata: OidcMetadata,
    fetched_at: Instant,
}

/// Per-issuer discovery cache behind a single mutex; fetches happen outside
/// the lock (double-checked refresh), per spec §5.
pub struct DiscoveryClient {
    http: reqwest::Client,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedMetadata>>,
}

impl DiscoveryClient {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, ttl: DEFAULT_DISCOVERY_TTL, cache: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn with_ttl(http: reqwest::Client, ttl: Duration) -> Self {
        Self { http, ttl, cache: Mutex::new(HashMap::new()) }
    }

    /// Returns cached metadata if fresh, otherwise fetches, validates, and
    /// caches it.
    pub async fn discover(&self, issuer: &str) -> Result<OidcMetadata, GatewayError> {
        if let Some(cached) = self.cached(issuer) {
            return Ok(cached);
        }

        let url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::authentication(format!("OIDC discovery fetch failed: {e}")))?;

        let metadata: OidcMetadata = response
            .json()
            .await
            .map_err(|e| GatewayError::authentication(format!("OIDC discovery parse failed: {e}")))?;

        if metadata.issuer.is_empty() {
            return Err(GatewayError::authentication("OIDC discovery document missing 'issuer'"));
        }
        if metadata.jwks_uri.is_empty() {
            return Err(GatewayError::authentication("OIDC discovery document missing 'jwks_uri'"));
        }

        self.cache.lock().insert(
            issuer.to_string(),
            CachedMetadata { metadata: metadata.clone(), fetched_at: Instant::now() },
        );

        Ok(metadata)
    }

    fn cached(&self, issuer: &str) -> Option<OidcMetadata> {
        let cache = self.cache.lock();
        let entry = cache.get(issuer)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.metadata.clone())
        } else {
            None
        }
    }
}

pub type SharedDiscoveryClient = Arc<DiscoveryClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn discovers_and_caches_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": server.uri(),
                "jwks_uri": format!("{}/jwks", server.uri()),
                "authorization_endpoint": format!("{}/auth", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DiscoveryClient::new(reqwest::Client::new());
        let metadata = client.discover(&server.uri()).await.unwrap();
        assert_eq!(metadata.issuer, server.uri());

        // Second call should hit the cache, not the mock (expect(1) above).
        let metadata2 = client.discover(&server.uri()).await.unwrap();
        assert_eq!(metadata2.jwks_uri, metadata.jwks_uri);
    }

    #[tokio::test]
    async fn missing_jwks_uri_is_a_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": server.uri(),
            })))
            .mount(&server)
            .await;

        let client = DiscoveryClient::new(reqwest::Client::new());
        assert!(client.discover(&server.uri()).await.is_err());
    }
}

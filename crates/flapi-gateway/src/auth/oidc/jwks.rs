//! JWKS fetching and key-id indexed cache (spec §4.4).
//!
//! Mirrors `fraiseql-server::auth::oidc_provider`'s JWKS refresh: keys are
//! cached per `jwks_uri` with a TTL (default 24h); a `kid` miss triggers one
//! forced refresh before giving up, to tolerate provider key rotation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use parking_lot::Mutex;
use serde::Deserialize;

use flapi_error::GatewayError;

const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, Deserialize)]
struct JwkRaw {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
    #[serde(default)]
    alg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<JwkRaw>,
}

/// A single resolved JWKS signing key.
#[derive(Clone)]
pub struct JwksKey {
    pub kid: String,
    pub alg: Option<String>,
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwksKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKey").field("kid", &self.kid).field("alg", &self.alg).finish()
    }
}

struct CachedKeySet {
    keys_by_kid: HashMap<String, JwksKey>,
    fetched_at: Instant,
}

/// Fetches and caches JWKS documents by URL, indexing resolved keys by `kid`.
pub struct JwksManager {
    http: reqwest::Client,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedKeySet>>,
}

impl JwksManager {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, ttl: DEFAULT_JWKS_TTL, cache: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn with_ttl(http: reqwest::Client, ttl: Duration) -> Self {
        Self { http, ttl, cache: Mutex::new(HashMap::new()) }
    }

    /// Resolves `kid` against the cached key set for `jwks_uri`, refreshing
    /// once from the network if the key is unknown or the cache is stale.
    pub async fn get_key(&self, jwks_uri: &str, kid: &str) -> Result<JwksKey, GatewayError> {
        if let Some(key) = self.cached_key(jwks_uri, kid) {
            return Ok(key);
        }

        self.refresh(jwks_uri).await?;

        self.cached_key(jwks_uri, kid)
            .ok_or_else(|| GatewayError::authentication(format!("unknown JWKS key id '{kid}'")))
    }

    fn cached_key(&self, jwks_uri: &str, kid: &str) -> Option<JwksKey> {
        let cache = self.cache.lock();
        let entry = cache.get(jwks_uri)?;
        if entry.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        entry.keys_by_kid.get(kid).cloned()
    }

    async fn refresh(&self, jwks_uri: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| GatewayError::authentication(format!("JWKS fetch failed: {e}")))?;

        let jwk_set: JwkSet = response
            .json()
            .await
            .map_err(|e| GatewayError::authentication(format!("JWKS parse failed: {e}")))?;

        let mut keys_by_kid = HashMap::new();
        for jwk in jwk_set.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            let decoding_key = DecodingKey::from_rsa_components(n, e)
                .map_err(|e| GatewayError::authentication(format!("invalid JWKS RSA key: {e}")))?;
            keys_by_kid.insert(
                jwk.kid.clone(),
                JwksKey { kid: jwk.kid, alg: jwk.alg, decoding_key },
            );
        }

        self.cache.lock().insert(
            jwks_uri.to_string(),
            CachedKeySet { keys_by_kid, fetched_at: Instant::now() },
        );
        Ok(())
    }
}

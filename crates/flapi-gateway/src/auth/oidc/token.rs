//! OIDC bearer token validation (spec §4.4).
//!
//! Verifies RS256/RS384/RS512 signatures against a JWKS-resolved key,
//! checks `iss`/`aud`/`exp` with a configurable clock-skew allowance
//! (default 300s), and maps claims into an `AuthContext`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;

use flapi_error::GatewayError;

use crate::auth::oidc::jwks::JwksManager;
use crate::auth::{AuthContext, AuthType};

/// Everything `validate_token` needs beyond the raw token and the JWKS
/// manager: resolved per-endpoint OIDC configuration.
pub struct TokenValidationInput<'a> {
    pub token: &'a str,
    pub jwks_uri: &'a str,
    pub expected_issuer: &'a str,
    pub allowed_audiences: &'a [String],
    pub clock_skew_seconds: i64,
    pub username_claim: &'a str,
    pub role_claim_path: Option<&'a str>,
    pub roles_claim: &'a str,
}

pub struct TokenValidationOutcome {
    pub context: AuthContext,
}

const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

pub async fn validate_token(
    input: TokenValidationInput<'_>,
    jwks: &JwksManager,
) -> Result<TokenValidationOutcome, GatewayError> {
    let header = decode_header(input.token)
        .map_err(|e| GatewayError::authentication(format!("malformed OIDC token header: {e}")))?;

    let algorithm = header.alg;
    if !ALLOWED_ALGORITHMS.contains(&algorithm) {
        return Err(GatewayError::authentication(format!(
            "unsupported OIDC signing algorithm {algorithm:?}"
        )));
    }

    let kid = header
        .kid
        .ok_or_else(|| GatewayError::authentication("OIDC token is missing a 'kid' header"))?;

    let key = jwks.get_key(input.jwks_uri, &kid).await?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = u64::try_from(input.clock_skew_seconds.max(0)).unwrap_or(0);
    validation.set_issuer(&[input.expected_issuer]);
    if input.allowed_audiences.is_empty() {
        validation.validate_aud = false;
    } else {
        validation.set_audience(input.allowed_audiences);
    }

    let decoded = decode::<HashMap<String, Value>>(input.token, &key.decoding_key, &validation)
        .map_err(|e| GatewayError::authentication(format!("OIDC token validation failed: {e}")))?;

    let claims = decoded.claims;

    let username = claims
        .get(input.username_claim)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GatewayError::authentication(format!(
                "OIDC token missing username claim '{}'",
                input.username_claim
            ))
        })?
        .to_string();

    let mut roles = extract_string_array(
        input
            .role_claim_path
            .filter(|p| !p.is_empty())
            .and_then(|path| get_claim_path(&Value::Object(claims.clone().into_iter().collect()), path))
            .or_else(|| claims.get(input.roles_claim)),
    );

    if let Some(groups) = claims.get("groups").and_then(Value::as_array) {
        for group in groups {
            if let Some(g) = group.as_str() {
                if !roles.contains(&g.to_string()) {
                    roles.push(g.to_string());
                }
            }
        }
    }

    let token_jti = claims.get("jti").and_then(Value::as_str).map(ToString::to_string);
    let token_expires_at = claims
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0));

    Ok(TokenValidationOutcome {
        context: AuthContext {
            authenticated: true,
            username,
            roles,
            auth_type: AuthType::Oidc,
            auth_time: Utc::now(),
            token_jti,
            token_expires_at,
            refresh_token: None,
        },
    })
}

fn extract_string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
        .unwrap_or_default()
}

/// Resolves a dotted claim path like `realm_access.roles` against a JSON
/// claims object.
fn get_claim_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

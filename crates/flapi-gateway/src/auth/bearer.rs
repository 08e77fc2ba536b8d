//! Bearer JWT (HS256) authentication (spec §4.3).

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthContext, AuthType};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BearerClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iss: Option<String>,
}

/// Decodes and verifies a bearer token against the configured shared secret
/// and issuer, extracting `sub` and optional `roles`.
pub fn authenticate(
    token: &str,
    shared_secret: &str,
    expected_issuer: Option<&str>,
) -> Result<AuthContext, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    if let Some(issuer) = expected_issuer {
        validation.set_issuer(&[issuer]);
    } else {
        validation.validate_aud = false;
    }

    let key = DecodingKey::from_secret(shared_secret.as_bytes());
    let decoded = decode::<BearerClaims>(token, &key, &validation)
        .map_err(|e| format!("invalid bearer token: {e}"))?;

    Ok(AuthContext {
        authenticated: true,
        username: decoded.claims.sub,
        roles: decoded.claims.roles,
        auth_type: AuthType::Bearer,
        auth_time: Utc::now(),
        token_jti: None,
        token_expires_at: decoded.claims.exp.and_then(|e| {
            chrono::DateTime::from_timestamp(e, 0)
        }),
        refresh_token: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(secret: &str, sub: &str, roles: Vec<String>, issuer: &str, exp: i64) -> String {
        let claims = BearerClaims { sub: sub.to_string(), roles, exp: Some(exp), iss: Some(issuer.to_string()) };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_authenticates_and_extracts_roles() {
        let exp = Utc::now().timestamp() + 3600;
        let token = sign("secret", "alice", vec!["admin".to_string()], "flapi", exp);
        let ctx = authenticate(&token, "secret", Some("flapi")).unwrap();
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.roles, vec!["admin".to_string()]);
        assert!(ctx.authenticated);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let exp = Utc::now().timestamp() + 3600;
        let token = sign("secret", "alice", vec![], "flapi", exp);
        assert!(authenticate(&token, "other-secret", Some("flapi")).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let exp = Utc::now().timestamp() - 3600;
        let token = sign("secret", "alice", vec![], "flapi", exp);
        assert!(authenticate(&token, "secret", Some("flapi")).is_err());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let exp = Utc::now().timestamp() + 3600;
        let token = sign("secret", "alice", vec![], "other-issuer", exp);
        assert!(authenticate(&token, "secret", Some("flapi")).is_err());
    }
}

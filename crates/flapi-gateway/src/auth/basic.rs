//! HTTP Basic authentication (spec §4.3).
//!
//! Password verification accepts either plaintext equality or, when the
//! stored value looks like a 32-char lowercase hex digest, MD5 equality.
//! This legacy path is inadequate for new deployments (spec §9) but is
//! reproduced faithfully for compatibility; comparisons run in constant
//! time to avoid adding a timing side-channel on top of the weak hash.

use base64::Engine as _;
use md5::{Digest, Md5};

use chrono::Utc;

use crate::auth::{AuthContext, AuthType};
use crate::endpoint::InlineUser as ConfiguredUser;

/// `true` if `candidate` looks like a 32-character lowercase hex string.
fn looks_like_md5_hex(candidate: &str) -> bool {
    candidate.len() == 32 && candidate.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte comparison, grounded on
/// `fraiseql-server::auth::constant_time`.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Verifies `presented_password` against `stored_password`, accepting
/// plaintext or (when the stored value is a 32-char lowercase hex digest)
/// MD5.
#[must_use]
pub fn verify_password(presented_password: &str, stored_password: &str) -> bool {
    if looks_like_md5_hex(stored_password) {
        constant_time_eq(&md5_hex(presented_password), stored_password)
    } else {
        constant_time_eq(presented_password, stored_password)
    }
}

/// Decodes an `Authorization: Basic <base64>` header value into
/// `(username, password)`.
#[must_use]
pub fn decode_basic_header(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    decoded.split_once(':').map(|(u, p)| (u.to_string(), p.to_string()))
}

/// Authenticates `username`/`password` against inline users, falling back
/// to an external secret table only when no inline users are configured at
/// all (grounded on `authenticateBasic` in
/// `examples/original_source/src/auth_middleware.cpp`, which gates the
/// external-secret lookup on the inline user list being empty, not on
/// whether this particular username was found in it).
#[must_use]
pub fn authenticate(
    username: &str,
    password: &str,
    inline_users: &[ConfiguredUser],
    external_secrets: Option<&std::collections::HashMap<String, String>>,
) -> Option<AuthContext> {
    if !inline_users.is_empty() {
        let user = inline_users.iter().find(|u| u.username == username)?;
        return verify_password(password, &user.password).then(|| success_context(username));
    }

    let secrets = external_secrets?;
    let stored = secrets.get(username)?;
    verify_password(password, stored).then(|| success_context(username))
}

fn success_context(username: &str) -> AuthContext {
    AuthContext {
        authenticated: true,
        username: username.to_string(),
        roles: vec![],
        auth_type: AuthType::Basic,
        auth_time: Utc::now(),
        token_jti: None,
        token_expires_at: None,
        refresh_token: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_stored_password_authenticates() {
        // MD5("password") = 5f4dcc3b5aa765d61d8327deb882cf99
        let user = ConfiguredUser {
            username: "alice".to_string(),
            password: "5f4dcc3b5aa765d61d8327deb882cf99".to_string(),
        };
        let ctx = authenticate("alice", "password", std::slice::from_ref(&user), None);
        assert!(ctx.is_some());

        let rejected = authenticate("alice", "wrong", std::slice::from_ref(&user), None);
        assert!(rejected.is_none());
    }

    #[test]
    fn plaintext_stored_password_authenticates() {
        let user = ConfiguredUser { username: "bob".to_string(), password: "hunter2".to_string() };
        assert!(authenticate("bob", "hunter2", std::slice::from_ref(&user), None).is_some());
        assert!(authenticate("bob", "hunter3", std::slice::from_ref(&user), None).is_none());
    }

    #[test]
    fn decodes_basic_header() {
        // base64("alice:password") = YWxpY2U6cGFzc3dvcmQ=
        let (u, p) = decode_basic_header("Basic YWxpY2U6cGFzc3dvcmQ=").unwrap();
        assert_eq!(u, "alice");
        assert_eq!(p, "password");
    }

    #[test]
    fn falls_back_to_external_secrets_when_no_inline_users_configured() {
        let mut secrets = std::collections::HashMap::new();
        secrets.insert("carol".to_string(), "5f4dcc3b5aa765d61d8327deb882cf99".to_string());
        let ctx = authenticate("carol", "password", &[], Some(&secrets));
        assert!(ctx.is_some());
    }

    #[test]
    fn does_not_fall_back_to_external_secrets_when_inline_users_are_configured() {
        let user = ConfiguredUser { username: "alice".to_string(), password: "hunter2".to_string() };
        let mut secrets = std::collections::HashMap::new();
        secrets.insert("carol".to_string(), "5f4dcc3b5aa765d61d8327deb882cf99".to_string());

        let ctx = authenticate("carol", "password", std::slice::from_ref(&user), Some(&secrets));
        assert!(ctx.is_none());
    }

    #[test]
    fn looks_like_md5_hex_rejects_uppercase_and_wrong_length() {
        assert!(!looks_like_md5_hex("5F4DCC3B5AA765D61D8327DEB882CF99"));
        assert!(!looks_like_md5_hex("not32chars"));
    }
}

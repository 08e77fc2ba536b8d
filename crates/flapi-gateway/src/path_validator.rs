//! URL-decoding, normalization, and traversal prevention (spec §4.7).

use std::path::{Path, PathBuf};

use flapi_error::GatewayError;

const DEFAULT_ALLOWED_SCHEMES: &[&str] = &["file", "https"];

#[derive(Debug, Clone)]
pub struct PathValidatorConfig {
    pub allowed_schemes: Vec<String>,
    pub allowed_prefixes: Vec<String>,
    pub resolve_symlinks: bool,
}

impl Default for PathValidatorConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: DEFAULT_ALLOWED_SCHEMES.iter().map(|s| (*s).to_string()).collect(),
            allowed_prefixes: Vec::new(),
            resolve_symlinks: false,
        }
    }
}

/// Iteratively URL-decodes `input` up to `max_rounds` times (catches
/// multi-level encoding of `..`), stopping early once decoding stabilizes.
fn decode_iteratively(input: &str, max_rounds: u8) -> String {
    let mut current = input.to_string();
    for _ in 0..max_rounds {
        let decoded = percent_decode(&current);
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) =
                (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2]))
            {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Backslashes become forward slashes; `//` runs collapse to `/`.
fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut out = String::with_capacity(unified.len());
    let mut last_was_slash = false;
    for c in unified.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(c);
    }
    out
}

/// `true` iff any path segment is exactly `..`.
fn has_traversal_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

fn scheme_of(path: &str) -> Option<&str> {
    path.split_once("://").map(|(scheme, _)| scheme)
}

/// Validates and normalizes `user_path`, rooted at `base_path` for local
/// relative paths. See spec §4.7 for the four-step algorithm.
pub fn validate(
    user_path: &str,
    base_path: Option<&Path>,
    config: &PathValidatorConfig,
) -> Result<String, GatewayError> {
    let decoded = decode_iteratively(user_path, 3);
    let normalized = normalize(&decoded);

    if has_traversal_segment(&normalized) {
        return Err(GatewayError::validation(vec![flapi_error::FieldError::new(
            "path",
            "Path traversal detected",
        )]));
    }

    if let Some(scheme) = scheme_of(&normalized) {
        if !config.allowed_schemes.iter().any(|s| s == scheme) {
            return Err(GatewayError::validation(vec![flapi_error::FieldError::new(
                "path",
                format!("Scheme '{scheme}' is not allowed"),
            )]));
        }
        return Ok(normalized);
    }

    let full_path = if Path::new(&normalized).is_absolute() {
        PathBuf::from(&normalized)
    } else {
        let base = base_path.ok_or_else(|| {
            GatewayError::validation(vec![flapi_error::FieldError::new(
                "path",
                "Relative path requires a base path",
            )])
        })?;
        base.join(&normalized)
    };

    let resolved = if config.resolve_symlinks {
        std::fs::canonicalize(&full_path).unwrap_or(full_path)
    } else {
        full_path
    };

    let resolved_str = resolved.to_string_lossy().replace('\\', "/");

    if !config.allowed_prefixes.is_empty()
        && !config.allowed_prefixes.iter().any(|p| resolved_str.starts_with(p.as_str()))
    {
        return Err(GatewayError::validation(vec![flapi_error::FieldError::new(
            "path",
            "Path is outside the allowed prefix",
        )]));
    }

    Ok(resolved_str)
}

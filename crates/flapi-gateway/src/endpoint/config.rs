//! Endpoint configuration entities (spec §3).

use serde::{Deserialize, Serialize};

use crate::validation::ValidatorConfig;

/// HTTP method, request-field location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestLocation {
    Query,
    Path,
    Header,
    Body,
}

/// A single request field: where it comes from, whether it's required, and
/// the validators that run against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFieldConfig {
    pub field_name: String,
    pub location: RequestLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Auth mode an endpoint can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Basic,
    Bearer,
    Oidc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineUser {
    pub username: String,
    /// Plaintext, or 32-char lowercase hex MD5 digest (legacy compatibility
    /// path; see spec §9 on password verification).
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub allowed_audiences: Vec<String>,
    #[serde(default = "default_username_claim")]
    pub username_claim: String,
    #[serde(default)]
    pub email_claim: Option<String>,
    #[serde(default)]
    pub role_claim_path: Option<String>,
    #[serde(default)]
    pub roles_claim: Option<String>,
    #[serde(default)]
    pub groups_claim: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_jwks_cache_hours")]
    pub jwks_cache_hours: u64,
    #[serde(default)]
    pub provider_preset: Option<String>,
    #[serde(default = "default_clock_skew_seconds")]
    pub clock_skew_seconds: i64,
}

fn default_username_claim() -> String {
    "sub".to_string()
}

fn default_jwks_cache_hours() -> u64 {
    24
}

const fn default_clock_skew_seconds() -> i64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub inline_users: Vec<InlineUser>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    #[serde(default)]
    pub oidc: Option<OidcConfig>,
    /// Name of a secret catalog entry resolved by the auth middleware's
    /// external-secret bootstrap (spec §4.3).
    #[serde(default)]
    pub external_secret_ref: Option<String>,
}

/// A cursor column used to bookmark incremental cache refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorConfig {
    pub column: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default)]
    pub keep_last_snapshots: Option<u32>,
    /// Maximum snapshot age in seconds.
    #[serde(default)]
    pub max_snapshot_age: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Storage catalog the cache table lives in. Defaults to the gateway's
    /// own Postgres database when absent.
    #[serde(default)]
    pub catalog: Option<String>,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub cursor: Option<CursorConfig>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResourceMetadata {
    pub resource_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpPromptMetadata {
    pub prompt_name: String,
    pub template: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single compiled endpoint: the unit of both REST and MCP exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Empty string means "not exposed over REST".
    #[serde(default)]
    pub url_path: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Empty string means "not exposed over MCP".
    #[serde(default)]
    pub mcp_name: String,
    pub template_source: String,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub fields: Vec<RequestFieldConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub rate_limit: Option<crate::rate_limit::RateLimitConfig>,
    #[serde(default)]
    pub mcp_tool: Option<McpToolMetadata>,
    #[serde(default)]
    pub mcp_resource: Option<McpResourceMetadata>,
    #[serde(default)]
    pub mcp_prompt: Option<McpPromptMetadata>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl EndpointConfig {
    #[must_use]
    pub fn has_rest(&self) -> bool {
        !self.url_path.is_empty()
    }

    #[must_use]
    pub fn has_mcp(&self) -> bool {
        !self.mcp_name.is_empty()
    }

    /// The REST index key: `"METHOD:url_path"`.
    #[must_use]
    pub fn rest_key(&self) -> String {
        rest_key(&self.url_path, &self.method)
    }
}

#[must_use]
pub fn rest_key(url_path: &str, method: &str) -> String {
    format!("{}:{}", method.to_ascii_uppercase(), url_path)
}

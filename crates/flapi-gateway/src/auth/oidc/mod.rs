//! OIDC discovery, JWKS management, and token validation (spec §4.4, §4.3).

pub mod discovery;
pub mod jwks;
pub mod presets;
pub mod token;

pub use discovery::{DiscoveryClient, OidcMetadata};
pub use jwks::{JwksKey, JwksManager};
pub use presets::{provider_preset, ProviderPreset};
pub use token::{validate_token, TokenValidationInput, TokenValidationOutcome};

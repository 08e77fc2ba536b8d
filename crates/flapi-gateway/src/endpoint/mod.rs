//! Endpoint configuration and the dual-indexed endpoint repository (spec §4.1).

mod config;
mod repository;

pub use config::{
    AuthConfig, AuthType, CacheConfig, EndpointConfig, McpPromptMetadata, McpResourceMetadata,
    McpToolMetadata, OidcConfig, RetentionConfig, RequestFieldConfig, RequestLocation,
};
pub use repository::EndpointRepository;

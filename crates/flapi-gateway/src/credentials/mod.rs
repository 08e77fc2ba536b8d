//! Per-cloud credential state, loaded from environment or explicit
//! configuration (spec §2 item 2, §6).
//!
//! Built once at startup and read thereafter — the credential manager is
//! consolidated to a long-lived client per the recommendation in spec §9,
//! rather than re-initializing an SDK client on every call.

use std::fmt;

/// Redacts its contents in `Debug`/`Display`, matching
/// `fraiseql-server::secrets_manager::types::Secret`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

#[derive(Debug, Clone, Default)]
pub struct AwsCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<Secret>,
    pub region: Option<String>,
    pub session_token: Option<Secret>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GcsCredentials {
    pub application_credentials_path: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AzureCredentials {
    pub connection_string: Option<Secret>,
    pub account: Option<String>,
    pub account_key: Option<Secret>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

/// Installed into the query engine's secret catalog at startup; read-only
/// thereafter (spec §5: "Credential manager: written at startup;
/// thereafter read-only").
#[derive(Debug, Clone, Default)]
pub struct CredentialManager {
    pub aws: AwsCredentials,
    pub gcs: GcsCredentials,
    pub azure: AzureCredentials,
}

impl CredentialManager {
    /// Loads credentials from the environment variables named in spec §6.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_source(|key| std::env::var(key).ok())
    }

    /// Testable variant: `lookup` stands in for `std::env::var`.
    pub fn from_env_source<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let aws = AwsCredentials {
            access_key_id: lookup("AWS_ACCESS_KEY_ID"),
            secret_access_key: lookup("AWS_SECRET_ACCESS_KEY").map(Secret::new),
            region: lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")),
            session_token: lookup("AWS_SESSION_TOKEN").map(Secret::new),
            endpoint_url: lookup("AWS_ENDPOINT_URL"),
        };

        let gcs = GcsCredentials {
            application_credentials_path: lookup("GOOGLE_APPLICATION_CREDENTIALS"),
            project: lookup("GOOGLE_CLOUD_PROJECT")
                .or_else(|| lookup("GCLOUD_PROJECT"))
                .or_else(|| lookup("GCP_PROJECT")),
        };

        let azure = AzureCredentials {
            connection_string: lookup("AZURE_STORAGE_CONNECTION_STRING").map(Secret::new),
            account: lookup("AZURE_STORAGE_ACCOUNT"),
            account_key: lookup("AZURE_STORAGE_KEY").map(Secret::new),
            tenant_id: lookup("AZURE_TENANT_ID"),
            client_id: lookup("AZURE_CLIENT_ID"),
        };

        Self { aws, gcs, azure }
    }

    #[must_use]
    pub fn has_aws(&self) -> bool {
        self.aws.access_key_id.is_some() && self.aws.secret_access_key.is_some()
    }

    #[must_use]
    pub fn has_gcs(&self) -> bool {
        self.gcs.application_credentials_path.is_some()
    }

    #[must_use]
    pub fn has_azure(&self) -> bool {
        self.azure.connection_string.is_some() || self.azure.account_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn secret_redacts_debug_and_display() {
        let secret = Secret::new("super-secret");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(format!("{secret}"), "***");
        assert_eq!(secret.expose(), "super-secret");
    }

    #[test]
    fn loads_aws_credentials_from_env_source() {
        let mut env = HashMap::new();
        env.insert("AWS_ACCESS_KEY_ID", "AKIA123");
        env.insert("AWS_SECRET_ACCESS_KEY", "shh");
        env.insert("AWS_REGION", "us-east-1");

        let manager = CredentialManager::from_env_source(|key| env.get(key).map(|v| (*v).to_string()));
        assert!(manager.has_aws());
        assert_eq!(manager.aws.region.as_deref(), Some("us-east-1"));
        assert!(!manager.has_gcs());
        assert!(!manager.has_azure());
    }

    #[test]
    fn falls_back_to_default_region_var() {
        let mut env = HashMap::new();
        env.insert("AWS_DEFAULT_REGION", "eu-west-1");
        let manager = CredentialManager::from_env_source(|key| env.get(key).map(|v| (*v).to_string()));
        assert_eq!(manager.aws.region.as_deref(), Some("eu-west-1"));
    }
}

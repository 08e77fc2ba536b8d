//! Remote object-storage / HTTP file provider.
//!
//! The gateway's core only needs a narrow read/exists/list surface over
//! whichever cloud SDK or HTTP client backs a given scheme — the SDK
//! integration itself is an external collaborator. This provider issues
//! plain HTTP GETs/HEADs through `reqwest` for `http(s)://` sources and
//! defers `s3://`/`gs://`/`az(ure)://` reads to a pluggable
//! [`ObjectStoreClient`] installed by the credential manager.

use async_trait::async_trait;
use flapi_error::GatewayError;

use super::FileProvider;

/// A minimal cloud object-store client seam. The query engine's own SDK
/// bindings (out of scope for this core) implement this for S3/GCS/Azure.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn get(&self, scheme: &str, path: &str) -> Result<Vec<u8>, GatewayError>;
    async fn head(&self, scheme: &str, path: &str) -> Result<bool, GatewayError>;
    async fn list(&self, scheme: &str, path: &str) -> Result<Vec<String>, GatewayError>;
}

pub struct RemoteFileProvider {
    http: reqwest::Client,
    object_store: Option<std::sync::Arc<dyn ObjectStoreClient>>,
}

impl RemoteFileProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, object_store: Option<std::sync::Arc<dyn ObjectStoreClient>>) -> Self {
        Self { http, object_store }
    }

    fn split(path: &str) -> Result<(&str, &str), GatewayError> {
        path.split_once("://")
            .ok_or_else(|| GatewayError::validation(vec![flapi_error::FieldError::new(
                "path",
                "Remote path must include a scheme",
            )]))
    }
}

#[async_trait]
impl FileProvider for RemoteFileProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        let (scheme, _) = Self::split(path)?;
        match scheme {
            "http" | "https" => {
                let resp = self
                    .http
                    .get(path)
                    .send()
                    .await
                    .map_err(|e| GatewayError::internal(format!("remote fetch failed: {e}")))?;
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::internal(format!("remote read failed: {e}")))?;
                Ok(bytes.to_vec())
            }
            other => {
                let client = self.object_store.as_ref().ok_or_else(|| {
                    GatewayError::configuration(format!("no object store client for scheme '{other}'"))
                })?;
                client.get(other, path).await
            }
        }
    }

    async fn file_exists(&self, path: &str) -> Result<bool, GatewayError> {
        let (scheme, _) = Self::split(path)?;
        match scheme {
            "http" | "https" => {
                let resp = self.http.head(path).send().await;
                Ok(resp.is_ok_and(|r| r.status().is_success()))
            }
            other => {
                let client = self.object_store.as_ref().ok_or_else(|| {
                    GatewayError::configuration(format!("no object store client for scheme '{other}'"))
                })?;
                client.head(other, path).await
            }
        }
    }

    async fn list_files(&self, path: &str, _glob: &str) -> Result<Vec<String>, GatewayError> {
        let (scheme, _) = Self::split(path)?;
        let client = self.object_store.as_ref().ok_or_else(|| {
            GatewayError::configuration(format!("no object store client for scheme '{scheme}'"))
        })?;
        client.list(scheme, path).await
    }
}

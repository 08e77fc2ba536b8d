//! Scheme-aware virtual file system abstraction (spec §2 item 1, §6).
//!
//! Grounded on `fraiseql-server::files::traits::StorageBackend`: a small,
//! stable trait implemented per storage scheme, with local and remote
//! variants sharing one interface.

mod local;
mod remote;

pub use local::LocalFileProvider;
pub use remote::RemoteFileProvider;

use async_trait::async_trait;
use flapi_error::GatewayError;

/// Remote URI schemes recognized by the VFS (spec §6).
pub const REMOTE_SCHEMES: &[&str] = &["s3", "gs", "az", "azure", "http", "https"];

#[must_use]
pub fn is_remote(path: &str) -> bool {
    path.split_once("://")
        .is_some_and(|(scheme, _)| REMOTE_SCHEMES.contains(&scheme))
}

#[must_use]
pub fn scheme_of(path: &str) -> Option<&str> {
    path.split_once("://").map(|(scheme, _)| scheme)
}

/// Implemented once per storage backend (local disk, S3, GCS, Azure, plain
/// HTTP). The caching decorator (`crate::cache_file_provider`) wraps any
/// implementation of this trait.
#[async_trait]
pub trait FileProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, GatewayError>;

    async fn file_exists(&self, path: &str) -> Result<bool, GatewayError>;

    /// Lists files matching a glob pattern under `path`.
    async fn list_files(&self, path: &str, glob: &str) -> Result<Vec<String>, GatewayError>;
}

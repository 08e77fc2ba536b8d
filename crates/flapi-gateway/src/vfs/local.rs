//! Local-disk file provider.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flapi_error::GatewayError;

use super::FileProvider;

#[derive(Debug, Clone)]
pub struct LocalFileProvider {
    root: PathBuf,
}

impl LocalFileProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

#[async_trait]
impl FileProvider for LocalFileProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        let full = self.resolve(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| GatewayError::internal(format!("failed to read {}: {e}", full.display())))
    }

    async fn file_exists(&self, path: &str) -> Result<bool, GatewayError> {
        Ok(tokio::fs::metadata(self.resolve(path)).await.is_ok())
    }

    async fn list_files(&self, path: &str, glob: &str) -> Result<Vec<String>, GatewayError> {
        let full = self.resolve(path);
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| GatewayError::internal(format!("failed to list {}: {e}", full.display())))?;

        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GatewayError::internal(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if glob_matches(glob, &name) {
                out.push(name);
            }
        }
        Ok(out)
    }
}

/// A minimal glob matcher supporting `*` and `?`, sufficient for the file
/// listing contract; full glob semantics are the config loader's concern.
fn glob_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" || pattern.is_empty() {
        return true;
    }
    fn recurse(p: &[char], n: &[char]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some('*'), _) => recurse(&p[1..], n) || (!n.is_empty() && recurse(p, &n[1..])),
            (Some('?'), Some(_)) => recurse(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => recurse(&p[1..], &n[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    recurse(&p, &n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_relative_and_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), b"1,2,3").unwrap();

        let provider = LocalFileProvider::new(dir.path());
        let content = provider.read_file("a.csv").await.unwrap();
        assert_eq!(content, b"1,2,3");

        let abs = dir.path().join("a.csv");
        let content2 = provider.read_file(abs.to_str().unwrap()).await.unwrap();
        assert_eq!(content2, b"1,2,3");
    }

    #[tokio::test]
    async fn file_exists_reports_accurately() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), b"x").unwrap();
        let provider = LocalFileProvider::new(dir.path());

        assert!(provider.file_exists("a.csv").await.unwrap());
        assert!(!provider.file_exists("missing.csv").await.unwrap());
    }

    #[tokio::test]
    async fn list_files_filters_by_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), b"x").unwrap();
        std::fs::write(dir.path().join("b.json"), b"x").unwrap();
        let provider = LocalFileProvider::new(dir.path());

        let csvs = provider.list_files(".", "*.csv").await.unwrap();
        assert_eq!(csvs, vec!["a.csv".to_string()]);
    }

    #[test]
    fn glob_matches_wildcards() {
        assert!(glob_matches("*.csv", "a.csv"));
        assert!(!glob_matches("*.csv", "a.json"));
        assert!(glob_matches("a?c", "abc"));
    }
}

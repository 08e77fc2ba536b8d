//! In-memory dual index over endpoints: `(url_path, method) -> endpoint` and
//! `mcp_name -> endpoint` (spec §4.1).
//!
//! No concurrency guarantees on mutation. Callers swap the whole repository
//! behind an `Arc` on reload rather than mutating a live one — readers
//! snapshot the `Arc` at request start (spec §5).

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{rest_key, EndpointConfig};

/// Dual-indexed, read-mostly store of compiled endpoints.
#[derive(Debug, Default, Clone)]
pub struct EndpointRepository {
    by_rest: HashMap<String, Arc<EndpointConfig>>,
    by_mcp: HashMap<String, Arc<EndpointConfig>>,
}

impl EndpointRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert into whichever index(es) apply, replacing any prior entry
    /// with the same key in that index.
    pub fn add(&mut self, endpoint: EndpointConfig) {
        let endpoint = Arc::new(endpoint);
        if endpoint.has_rest() {
            self.by_rest.insert(endpoint.rest_key(), endpoint.clone());
        }
        if endpoint.has_mcp() {
            self.by_mcp.insert(endpoint.mcp_name.clone(), endpoint);
        }
    }

    #[must_use]
    pub fn get_by_rest(&self, url_path: &str, method: &str) -> Option<Arc<EndpointConfig>> {
        self.by_rest.get(&rest_key(url_path, method)).cloned()
    }

    #[must_use]
    pub fn get_by_mcp(&self, name: &str) -> Option<Arc<EndpointConfig>> {
        self.by_mcp.get(name).cloned()
    }

    /// Acts only on the REST index; leaves any MCP registration intact.
    pub fn remove_rest(&mut self, url_path: &str, method: &str) -> Option<Arc<EndpointConfig>> {
        self.by_rest.remove(&rest_key(url_path, method))
    }

    /// Acts only on the MCP index; leaves any REST registration intact.
    pub fn remove_mcp(&mut self, name: &str) -> Option<Arc<EndpointConfig>> {
        self.by_mcp.remove(name)
    }

    /// Number of *unique* endpoints — one appearing in both indices counts
    /// once.
    #[must_use]
    pub fn count(&self) -> usize {
        self.unique_endpoints().count()
    }

    /// Traverse all unique endpoints matching `predicate`.
    pub fn find<F>(&self, mut predicate: F) -> Vec<Arc<EndpointConfig>>
    where
        F: FnMut(&EndpointConfig) -> bool,
    {
        self.unique_endpoints()
            .filter(|e| predicate(e))
            .collect()
    }

    /// All unique endpoints, deduplicated by pointer identity for endpoints
    /// present in both indices.
    fn unique_endpoints(&self) -> impl Iterator<Item = Arc<EndpointConfig>> + '_ {
        let mut seen: Vec<*const EndpointConfig> = Vec::new();
        self.by_rest
            .values()
            .chain(self.by_mcp.values())
            .filter(move |e| {
                let ptr = Arc::as_ptr(e);
                if seen.contains(&ptr) {
                    false
                } else {
                    seen.push(ptr);
                    true
                }
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url_path: &str, method: &str, mcp_name: &str) -> EndpointConfig {
        EndpointConfig {
            url_path: url_path.to_string(),
            method: method.to_string(),
            mcp_name: mcp_name.to_string(),
            template_source: "select 1".to_string(),
            connections: vec![],
            fields: vec![],
            cache: None,
            auth: None,
            rate_limit: None,
            mcp_tool: None,
            mcp_resource: None,
            mcp_prompt: None,
        }
    }

    #[test]
    fn rest_and_mcp_index_independently() {
        let mut repo = EndpointRepository::new();
        repo.add(endpoint("/customers", "GET", "customer_lookup"));

        assert!(repo.get_by_rest("/customers", "GET").is_some());
        assert!(repo.get_by_mcp("customer_lookup").is_some());
        assert_eq!(repo.count(), 1);

        repo.remove_rest("/customers", "GET");
        assert!(repo.get_by_rest("/customers", "GET").is_none());
        assert!(repo.get_by_mcp("customer_lookup").is_some());
    }

    #[test]
    fn remove_mcp_leaves_rest_intact() {
        let mut repo = EndpointRepository::new();
        repo.add(endpoint("/customers", "GET", "customer_lookup"));

        repo.remove_mcp("customer_lookup");
        assert!(repo.get_by_mcp("customer_lookup").is_none());
        assert!(repo.get_by_rest("/customers", "GET").is_some());
    }

    #[test]
    fn count_deduplicates_dual_registered_endpoint() {
        let mut repo = EndpointRepository::new();
        repo.add(endpoint("/customers", "GET", "customer_lookup"));
        repo.add(endpoint("/orders", "GET", ""));
        repo.add(endpoint("", "GET", "prompt_only"));

        assert_eq!(repo.count(), 3);
    }

    #[test]
    fn add_replaces_prior_entry_with_same_key() {
        let mut repo = EndpointRepository::new();
        repo.add(endpoint("/customers", "GET", "v1"));
        repo.add(endpoint("/customers", "GET", "v2"));

        assert_eq!(repo.count(), 1);
        assert_eq!(repo.get_by_rest("/customers", "GET").unwrap().mcp_name, "v2");
    }

    #[test]
    fn find_traverses_unique_endpoints() {
        let mut repo = EndpointRepository::new();
        repo.add(endpoint("/a", "GET", "a"));
        repo.add(endpoint("/b", "POST", ""));

        let gets = repo.find(|e| e.method == "GET");
        assert_eq!(gets.len(), 1);
    }
}

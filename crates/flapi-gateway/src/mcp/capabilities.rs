//! MCP client-capability detection from the `initialize` request (spec §2
//! item 15, §4.10), grounded on
//! `MCPClientCapabilitiesDetector::detectFromInitialize` in
//! `examples/original_source/src/mcp_client_capabilities.cpp`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Capabilities a connecting MCP client advertised in `initialize`, stored
/// on its session (spec §3 `MCPSession.capabilities`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpClientCapabilities {
    pub supports_sampling: bool,
    pub supports_roots: bool,
    /// Never set by `detect_from_initialize` — the original detector has no
    /// `"logging"` extraction path either, only a getter.
    pub supports_logging: bool,
    pub supported_protocols: Vec<String>,
}

/// Detects capabilities from `initialize`'s `params.capabilities` object.
/// A missing or malformed `capabilities` object yields the all-`false`,
/// empty default rather than an error.
#[must_use]
pub fn detect_from_initialize(params: &Value) -> McpClientCapabilities {
    let mut capabilities = McpClientCapabilities::default();

    let Some(caps_obj) = params.get("capabilities").and_then(Value::as_object) else {
        return capabilities;
    };

    capabilities.supports_sampling = extract_boolean_capability(caps_obj, "sampling");
    capabilities.supports_roots = extract_boolean_capability(caps_obj, "roots");
    capabilities.supported_protocols = extract_supported_protocols(caps_obj);

    capabilities
}

fn extract_boolean_capability(capabilities: &Map<String, Value>, name: &str) -> bool {
    capabilities.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Scans every nested capability object for a `supportedProtocols` array,
/// matching the original's loop over all capability keys rather than one
/// fixed location.
fn extract_supported_protocols(capabilities: &Map<String, Value>) -> Vec<String> {
    capabilities
        .values()
        .filter_map(Value::as_object)
        .filter_map(|cap| cap.get("supportedProtocols"))
        .filter_map(Value::as_array)
        .flat_map(|protocols| protocols.iter().filter_map(Value::as_str).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sampling_and_roots_booleans() {
        let params = serde_json::json!({ "capabilities": { "sampling": true, "roots": false } });
        let caps = detect_from_initialize(&params);
        assert!(caps.supports_sampling);
        assert!(!caps.supports_roots);
    }

    #[test]
    fn collects_supported_protocols_from_nested_capability_objects() {
        let params = serde_json::json!({
            "capabilities": { "roots": { "supportedProtocols": ["file", "https"] } }
        });
        let caps = detect_from_initialize(&params);
        assert_eq!(caps.supported_protocols, vec!["file".to_string(), "https".to_string()]);
    }

    #[test]
    fn missing_capabilities_object_yields_default() {
        let caps = detect_from_initialize(&Value::Null);
        assert!(!caps.supports_sampling);
        assert!(caps.supported_protocols.is_empty());
    }

    #[test]
    fn non_boolean_capability_value_is_treated_as_unsupported() {
        let params = serde_json::json!({ "capabilities": { "sampling": "yes" } });
        assert!(!detect_from_initialize(&params).supports_sampling);
    }
}

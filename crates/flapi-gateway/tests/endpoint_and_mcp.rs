//! Cross-module integration: endpoint registration, REST param rendering,
//! and the MCP JSON-RPC dispatcher against a shared endpoint repository.

use std::collections::HashMap;

use flapi_gateway::endpoint::{
    EndpointConfig, EndpointRepository, McpPromptMetadata, McpToolMetadata, RequestFieldConfig, RequestLocation,
};
use flapi_gateway::mcp::{JsonRpcRequest, McpAuthConfig, McpDispatcher, SessionManager};
use flapi_gateway::rest::{extract_params, render_template, RestRequest};
use flapi_gateway::validation::ValidatorConfig;

fn lookup_endpoint() -> EndpointConfig {
    EndpointConfig {
        url_path: "/customers/:id".to_string(),
        method: "GET".to_string(),
        mcp_name: "customer_lookup".to_string(),
        template_source: "SELECT * FROM customers WHERE id = :id".to_string(),
        connections: vec![],
        fields: vec![RequestFieldConfig {
            field_name: "id".to_string(),
            location: RequestLocation::Path,
            required: true,
            default: None,
            validators: vec![ValidatorConfig::Int { min: 1, max: 0, prevent_sql_injection: true }],
            description: Some("customer id".to_string()),
        }],
        cache: None,
        auth: None,
        rate_limit: None,
        mcp_tool: Some(McpToolMetadata { name: "customer_lookup".to_string(), description: Some("Look up a customer".to_string()) }),
        mcp_resource: None,
        mcp_prompt: None,
    }
}

fn greeting_prompt_endpoint() -> EndpointConfig {
    EndpointConfig {
        url_path: String::new(),
        method: "GET".to_string(),
        mcp_name: "greeting".to_string(),
        template_source: "SELECT 1".to_string(),
        connections: vec![],
        fields: vec![],
        cache: None,
        auth: None,
        rate_limit: None,
        mcp_tool: None,
        mcp_resource: None,
        mcp_prompt: Some(McpPromptMetadata {
            prompt_name: "greeting".to_string(),
            template: "Hello, {{name}}!".to_string(),
            description: Some("A friendly greeting".to_string()),
        }),
    }
}

#[test]
fn endpoint_is_reachable_through_both_indices() {
    let mut repo = EndpointRepository::new();
    repo.add(lookup_endpoint());

    assert!(repo.get_by_rest("/customers/:id", "GET").is_some());
    assert!(repo.get_by_mcp("customer_lookup").is_some());
    assert_eq!(repo.count(), 1);
}

#[test]
fn rest_param_extraction_and_template_rendering_round_trip() {
    let endpoint = lookup_endpoint();

    let mut request = RestRequest::default();
    request.path_params.insert("id".to_string(), "42".to_string());

    let params = extract_params(&endpoint, &request);
    let (sql, bind_params) = render_template(&endpoint.template_source, &endpoint.fields, &params).unwrap();

    assert_eq!(sql, "SELECT * FROM customers WHERE id = $1");
    assert_eq!(bind_params, vec![serde_json::Value::from(42)]);
}

fn dispatcher() -> McpDispatcher {
    let pool = flapi_gateway::test_support::unconnected_pool();
    McpDispatcher::new(std::sync::Arc::new(flapi_gateway::executor::QueryExecutor::new(pool)))
}

#[tokio::test]
async fn mcp_initialize_reports_fixed_protocol_version_and_issues_a_session() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig::default();
    let repo = EndpointRepository::new();

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: "initialize".to_string(),
        params: serde_json::json!({ "capabilities": { "sampling": true } }),
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    assert_eq!(outcome.response.id, Some(serde_json::json!(1)));
    assert_eq!(outcome.response.result.unwrap()["protocolVersion"], "2024-11-05");

    let session_id = outcome.session_id.expect("initialize issues a session id");
    let session = sessions.touch(&session_id).expect("issued session is live");
    assert!(session.capabilities.supports_sampling);
}

#[tokio::test]
async fn mcp_tools_list_reflects_registered_endpoints() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig::default();
    let mut repo = EndpointRepository::new();
    repo.add(lookup_endpoint());

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!("a")),
        method: "tools/list".to_string(),
        params: serde_json::Value::Null,
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    let tools = outcome.response.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "customer_lookup");
}

#[tokio::test]
async fn mcp_unknown_method_preserves_request_id_and_reports_method_not_found() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig::default();
    let repo = EndpointRepository::new();

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(99)),
        method: "not/a/real/method".to_string(),
        params: serde_json::Value::Null,
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    assert_eq!(outcome.response.id, Some(serde_json::json!(99)));
    assert_eq!(outcome.response.error.unwrap().code, -32601);
}

#[tokio::test]
async fn mcp_prompts_get_renders_supplied_arguments() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig::default();
    let mut repo = EndpointRepository::new();
    repo.add(greeting_prompt_endpoint());

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(5)),
        method: "prompts/get".to_string(),
        params: serde_json::json!({ "name": "greeting", "arguments": { "name": "Ada" } }),
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    let result = outcome.response.result.unwrap();
    let text = &result["messages"][0]["content"]["text"];
    assert_eq!(text, "Hello, Ada!");
}

#[tokio::test]
async fn mcp_rejects_non_2_0_jsonrpc_version() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig::default();
    let repo = EndpointRepository::new();

    let request = JsonRpcRequest {
        jsonrpc: "1.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: "ping".to_string(),
        params: serde_json::Value::Null,
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    assert_eq!(outcome.response.error.unwrap().code, -32600);
}

#[tokio::test]
async fn mcp_rejects_malformed_method_name() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig::default();
    let repo = EndpointRepository::new();

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: None,
        method: "9invalid".to_string(),
        params: serde_json::Value::Null,
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    assert_eq!(outcome.response.error.unwrap().code, -32600);
}

#[tokio::test]
async fn mcp_auth_required_method_is_rejected_without_session_or_header() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig { enabled: true, ..McpAuthConfig::default() };
    let repo = EndpointRepository::new();

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: "tools/list".to_string(),
        params: serde_json::Value::Null,
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, None, None, &request).await;
    assert_eq!(outcome.response.error.unwrap().code, -32001);
}

#[tokio::test]
async fn mcp_auth_required_method_succeeds_with_authenticated_session() {
    let dispatcher = dispatcher();
    let sessions = SessionManager::new();
    let mcp_auth = McpAuthConfig { enabled: true, ..McpAuthConfig::default() };
    let repo = EndpointRepository::new();

    let session_id = sessions.create(flapi_gateway::auth::AuthContext {
        authenticated: true,
        username: "alice".to_string(),
        roles: vec![],
        auth_type: flapi_gateway::auth::AuthType::Basic,
        auth_time: chrono::Utc::now(),
        token_jti: None,
        token_expires_at: None,
        refresh_token: None,
    });

    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: "tools/list".to_string(),
        params: serde_json::Value::Null,
    };

    let outcome = dispatcher.dispatch(&repo, &sessions, &mcp_auth, Some(&session_id), None, &request).await;
    assert!(outcome.response.error.is_none());
}

#[test]
fn unknown_params_map_stays_empty_when_no_extra_fields_present() {
    let endpoint = lookup_endpoint();
    let request = RestRequest::default();
    let params: HashMap<String, String> = extract_params(&endpoint, &request);
    assert!(params.is_empty());
}

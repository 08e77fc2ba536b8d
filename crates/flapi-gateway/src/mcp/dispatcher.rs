//! JSON-RPC 2.0 method dispatch for the MCP subsystem (spec §4.10, §4.11).
//!
//! One fixed `protocolVersion` is advertised (spec Open Question: kept at
//! `"2024-11-05"` rather than negotiated, matching the single-version
//! clients this gateway currently targets).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use flapi_error::jsonrpc::JsonRpcError;
use flapi_error::{FieldError, GatewayError};

use crate::endpoint::EndpointRepository;
use crate::executor::QueryExecutor;
use crate::mcp::auth::McpAuthConfig;
use crate::mcp::capabilities::detect_from_initialize;
use crate::mcp::content::ContentBlock;
use crate::mcp::session::SessionManager;
use crate::rest::{apply_pagination, render_template};
use crate::validation::{validate_no_unknown_params, validate_request};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const SUPPORTED_LOG_LEVELS: &[&str] =
    &["debug", "info", "notice", "warning", "error", "critical", "alert", "emergency"];

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn err(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }
}

/// A dispatched response plus, when `initialize` created a new session, the
/// id a caller should surface as the `Mcp-Session-Id` response header (spec
/// §4.10 step 5).
#[derive(Debug, Clone)]
pub struct McpDispatchOutcome {
    pub response: JsonRpcResponse,
    pub session_id: Option<String>,
}

impl McpDispatchOutcome {
    fn response_only(response: JsonRpcResponse) -> Self {
        Self { response, session_id: None }
    }
}

/// Parses a raw JSON-RPC request body, mapping malformed JSON to the
/// standard `-32700` parse error (spec §4.10 step 1).
pub fn parse_request(body: &str) -> Result<JsonRpcRequest, JsonRpcError> {
    serde_json::from_str(body).map_err(|_| JsonRpcError::parse_error())
}

fn method_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_./]*$").expect("valid regex"))
}

/// Validates `jsonrpc == "2.0"` and the method-name shape (spec §4.10 step
/// 3).
fn validate_request_shape(request: &JsonRpcRequest) -> Result<(), JsonRpcError> {
    if request.jsonrpc != "2.0" {
        return Err(JsonRpcError::invalid_request(format!(
            "jsonrpc must be \"2.0\", got '{}'",
            request.jsonrpc
        )));
    }
    if !method_name_regex().is_match(&request.method) {
        return Err(JsonRpcError::invalid_request(format!("invalid method name '{}'", request.method)));
    }
    Ok(())
}

/// Converts a JSON-RPC `arguments` object into the flat string map the
/// validation pipeline expects.
fn arguments_to_params(arguments: &Value) -> HashMap<String, String> {
    let Value::Object(map) = arguments else {
        return HashMap::new();
    };
    map.iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), s)
        })
        .collect()
}

/// Dispatches JSON-RPC requests against the current endpoint repository
/// snapshot.
pub struct McpDispatcher {
    executor: Arc<QueryExecutor>,
}

impl McpDispatcher {
    #[must_use]
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Dispatches one JSON-RPC request, gating auth-required methods against
    /// `mcp_auth` and an existing session (via `session_id`) or the
    /// request's own `authorization_header` (spec §4.10 steps 3-5).
    pub async fn dispatch(
        &self,
        endpoints: &EndpointRepository,
        sessions: &SessionManager,
        mcp_auth: &McpAuthConfig,
        session_id: Option<&str>,
        authorization_header: Option<&str>,
        request: &JsonRpcRequest,
    ) -> McpDispatchOutcome {
        let id = request.id.clone();

        if let Err(error) = validate_request_shape(request) {
            return McpDispatchOutcome::response_only(JsonRpcResponse::err(id, error));
        }

        let session = session_id.and_then(|sid| sessions.touch(sid));
        let header_auth = authorization_header.and_then(|h| mcp_auth.authenticate_header(h));
        let authenticated = session.as_ref().is_some_and(|s| s.auth.is_authenticated())
            || header_auth.as_ref().is_some_and(crate::auth::AuthContext::is_authenticated);

        if !mcp_auth.authorizes(&request.method, authenticated) {
            let error = JsonRpcError::from(GatewayError::authentication(format!(
                "method '{}' requires authentication",
                request.method
            )));
            return McpDispatchOutcome::response_only(JsonRpcResponse::err(id, error));
        }

        match request.method.as_str() {
            "initialize" => {
                let capabilities = detect_from_initialize(&request.params);
                let auth = header_auth.unwrap_or_else(crate::auth::AuthContext::anonymous);
                let new_session_id = sessions.create(auth);
                sessions.set_capabilities(&new_session_id, capabilities);
                McpDispatchOutcome {
                    response: JsonRpcResponse::ok(id, initialize_result()),
                    session_id: Some(new_session_id),
                }
            }
            "ping" => McpDispatchOutcome::response_only(JsonRpcResponse::ok(id, serde_json::json!({}))),
            "tools/list" => McpDispatchOutcome::response_only(JsonRpcResponse::ok(id, tools_list(endpoints))),
            "tools/call" => McpDispatchOutcome::response_only(match self.tools_call(endpoints, &request.params).await {
                Ok(result) => JsonRpcResponse::ok(id, result),
                Err(e) => JsonRpcResponse::err(id, e),
            }),
            "resources/list" => McpDispatchOutcome::response_only(JsonRpcResponse::ok(id, resources_list(endpoints))),
            "resources/templates/list" => McpDispatchOutcome::response_only(JsonRpcResponse::ok(
                id,
                serde_json::json!({ "resourceTemplates": [] }),
            )),
            "resources/read" => {
                McpDispatchOutcome::response_only(match self.resources_read(endpoints, &request.params).await {
                    Ok(result) => JsonRpcResponse::ok(id, result),
                    Err(e) => JsonRpcResponse::err(id, e),
                })
            }
            "prompts/list" => McpDispatchOutcome::response_only(JsonRpcResponse::ok(id, prompts_list(endpoints))),
            "prompts/get" => McpDispatchOutcome::response_only(match prompts_get(endpoints, &request.params) {
                Ok(result) => JsonRpcResponse::ok(id, result),
                Err(e) => JsonRpcResponse::err(id, e),
            }),
            "logging/setLevel" => McpDispatchOutcome::response_only(match logging_set_level(&request.params) {
                Ok(()) => JsonRpcResponse::ok(id, serde_json::json!({})),
                Err(e) => JsonRpcResponse::err(id, e),
            }),
            "completion/complete" => McpDispatchOutcome::response_only(JsonRpcResponse::ok(
                id,
                serde_json::json!({ "completion": { "values": [], "total": 0, "hasMore": false } }),
            )),
            other => McpDispatchOutcome::response_only(JsonRpcResponse::err(id, JsonRpcError::method_not_found(other))),
        }
    }

    async fn tools_call(&self, endpoints: &EndpointRepository, params: &Value) -> Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing 'name'"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()));

        let endpoint = endpoints
            .get_by_mcp(name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown tool '{name}'")))?;
        if endpoint.mcp_tool.is_none() {
            return Err(JsonRpcError::invalid_params(format!("'{name}' is not a tool")));
        }

        let param_map = arguments_to_params(&arguments);

        let mut errors: Vec<FieldError> = validate_no_unknown_params(&endpoint.fields, &param_map);
        errors.extend(validate_request(&endpoint.fields, &param_map));
        if !errors.is_empty() {
            return Err(JsonRpcError::from(GatewayError::validation(errors)));
        }

        let (sql, mut bind_params) =
            render_template(&endpoint.template_source, &endpoint.fields, &param_map).map_err(JsonRpcError::from)?;
        let (sql, _pagination) = apply_pagination(&sql, &mut bind_params, &param_map);

        let result = self.executor.execute(&sql, &bind_params).await.map_err(JsonRpcError::from)?;

        let content: Vec<ContentBlock> = result.rows.iter().map(ContentBlock::json).collect();
        Ok(serde_json::json!({ "content": content, "isError": false }))
    }

    async fn resources_read(&self, endpoints: &EndpointRepository, params: &Value) -> Result<Value, JsonRpcError> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing 'uri'"))?;

        let endpoint = endpoints
            .get_by_mcp(uri)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown resource '{uri}'")))?;
        let resource = endpoint
            .mcp_resource
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_params(format!("'{uri}' is not a resource")))?;

        let result = self
            .executor
            .execute(&endpoint.template_source, &[])
            .await
            .map_err(JsonRpcError::from)?;

        let text = serde_json::to_string_pretty(&result.rows).unwrap_or_default();
        Ok(serde_json::json!({
            "contents": [{
                "uri": uri,
                "mimeType": resource.mime_type.clone().unwrap_or_else(|| "application/json".to_string()),
                "text": text,
            }]
        }))
    }
}

fn initialize_result() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": { "name": "flapi-gateway", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {},
            "logging": {},
        }
    })
}

fn tools_list(endpoints: &EndpointRepository) -> Value {
    let tools: Vec<Value> = endpoints
        .find(|e| e.mcp_tool.is_some())
        .into_iter()
        .map(|e| {
            let tool = e.mcp_tool.as_ref().expect("filtered to Some");
            serde_json::json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": input_schema(&e.fields),
            })
        })
        .collect();
    serde_json::json!({ "tools": tools })
}

fn input_schema(fields: &[crate::endpoint::RequestFieldConfig]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.field_name.clone(), serde_json::json!({ "type": "string", "description": f.description })))
        .collect();
    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.field_name.as_str()).collect();
    serde_json::json!({ "type": "object", "properties": properties, "required": required })
}

fn resources_list(endpoints: &EndpointRepository) -> Value {
    let resources: Vec<Value> = endpoints
        .find(|e| e.mcp_resource.is_some())
        .into_iter()
        .map(|e| {
            let resource = e.mcp_resource.as_ref().expect("filtered to Some");
            serde_json::json!({
                "uri": e.mcp_name,
                "name": resource.resource_name,
                "description": resource.description,
                "mimeType": resource.mime_type,
            })
        })
        .collect();
    serde_json::json!({ "resources": resources })
}

fn prompts_list(endpoints: &EndpointRepository) -> Value {
    let prompts: Vec<Value> = endpoints
        .find(|e| e.mcp_prompt.is_some())
        .into_iter()
        .map(|e| {
            let prompt = e.mcp_prompt.as_ref().expect("filtered to Some");
            serde_json::json!({ "name": prompt.prompt_name, "description": prompt.description })
        })
        .collect();
    serde_json::json!({ "prompts": prompts })
}

fn prompts_get(endpoints: &EndpointRepository, params: &Value) -> Result<Value, JsonRpcError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("missing 'name'"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()));

    let endpoint = endpoints
        .get_by_mcp(name)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown prompt '{name}'")))?;
    let prompt = endpoint
        .mcp_prompt
        .as_ref()
        .ok_or_else(|| JsonRpcError::invalid_params(format!("'{name}' is not a prompt")))?;

    let param_map = arguments_to_params(&arguments);
    let rendered = render_prompt_template(&prompt.template, &param_map);

    Ok(serde_json::json!({
        "description": prompt.description,
        "messages": [{ "role": "user", "content": ContentBlock::text(rendered) }],
    }))
}

/// Substitutes `{{name}}` placeholders in a prompt template with argument
/// values; unresolved placeholders are left verbatim.
fn render_prompt_template(template: &str, params: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in params {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

fn logging_set_level(params: &Value) -> Result<(), JsonRpcError> {
    let level = params
        .get("level")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("missing 'level'"))?;
    if SUPPORTED_LOG_LEVELS.contains(&level) {
        Ok(())
    } else {
        Err(JsonRpcError::invalid_params(format!("unsupported log level '{level}'")))
    }
}

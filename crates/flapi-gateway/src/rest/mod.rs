//! REST Handler: turns an HTTP request into a rendered SQL template
//! execution and a JSON response envelope (spec §4.14).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;

use flapi_error::{FieldError, GatewayError};

use crate::endpoint::{EndpointConfig, RequestFieldConfig, RequestLocation};
use crate::executor::{QueryExecutor, QueryResult};
use crate::validation::{validate_no_unknown_params, validate_request, ValidatorConfig};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

/// The raw, not-yet-merged request data, split by source per spec §3
/// `RequestLocation`.
#[derive(Debug, Default, Clone)]
pub struct RestRequest {
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body_params: HashMap<String, String>,
}

/// Merges a request's per-location maps into a single flattened parameter
/// map, keyed by each field's declared `location`. Fields not declared on
/// the endpoint (e.g. `offset`, `limit`) are passed through from query
/// params unconditionally.
#[must_use]
pub fn extract_params(endpoint: &EndpointConfig, request: &RestRequest) -> HashMap<String, String> {
    let mut merged = HashMap::new();

    for field in &endpoint.fields {
        let source = match field.location {
            RequestLocation::Query => &request.query_params,
            RequestLocation::Path => &request.path_params,
            RequestLocation::Header => &request.headers,
            RequestLocation::Body => &request.body_params,
        };
        if let Some(value) = source.get(&field.field_name) {
            merged.insert(field.field_name.clone(), value.clone());
        }
    }

    for key in ["offset", "limit"] {
        if let Some(value) = request.query_params.get(key) {
            merged.insert(key.to_string(), value.clone());
        }
    }

    merged
}

fn param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"))
}

fn field_value(field: &RequestFieldConfig, raw: Option<&String>) -> Value {
    let Some(raw) = raw.or(field.default.as_ref()) else {
        return Value::Null;
    };
    let is_int = field.validators.iter().any(|v| matches!(v, ValidatorConfig::Int { .. }));
    if is_int {
        raw.parse::<i64>().map_or_else(|_| Value::String(raw.clone()), Value::from)
    } else {
        Value::String(raw.clone())
    }
}

/// Renders `:field_name` placeholders in a SQL template into `$1, $2, ...`
/// positional parameters, deduplicating repeated references to the same
/// field. Unknown placeholders are a configuration error.
pub fn render_template(
    template: &str,
    fields: &[RequestFieldConfig],
    params: &HashMap<String, String>,
) -> Result<(String, Vec<Value>), GatewayError> {
    let field_by_name: HashMap<&str, &RequestFieldConfig> =
        fields.iter().map(|f| (f.field_name.as_str(), f)).collect();

    let mut bind_params = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut error = None;

    let rendered = param_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if let Some(&idx) = index_of.get(name) {
                return format!("${idx}");
            }
            let Some(field) = field_by_name.get(name) else {
                error = Some(GatewayError::configuration(format!(
                    "template references undeclared field ':{name}'"
                )));
                return String::new();
            };
            bind_params.push(field_value(field, params.get(name)));
            let idx = bind_params.len();
            index_of.insert(name.to_string(), idx);
            format!("${idx}")
        })
        .into_owned();

    if let Some(e) = error {
        return Err(e);
    }
    Ok((rendered, bind_params))
}

/// Appends a `LIMIT $n OFFSET $n` clause using `offset`/`limit` query
/// params, clamped to `[1, MAX_LIMIT]` and `>= 0` respectively.
pub fn apply_pagination(sql: &str, bind_params: &mut Vec<Value>, params: &HashMap<String, String>) -> (String, PaginationMeta) {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);
    let offset = params.get("offset").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0).max(0);

    bind_params.push(Value::from(limit));
    let limit_idx = bind_params.len();
    bind_params.push(Value::from(offset));
    let offset_idx = bind_params.len();

    (format!("{sql} LIMIT ${limit_idx} OFFSET ${offset_idx}"), PaginationMeta { limit, offset })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginationMeta {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RestResponseEnvelope {
    pub success: bool,
    pub data: Vec<Value>,
    pub pagination: PaginationMeta,
}

/// Executes an endpoint's SQL template against the caller's request,
/// validating first and rendering the response envelope last.
pub struct RestHandler {
    executor: Arc<QueryExecutor>,
}

impl RestHandler {
    #[must_use]
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Runs the full request pipeline: extract, validate, render, execute,
    /// envelope.
    pub async fn handle(
        &self,
        endpoint: &EndpointConfig,
        request: &RestRequest,
    ) -> Result<RestResponseEnvelope, GatewayError> {
        let params = extract_params(endpoint, request);

        let mut errors: Vec<FieldError> = validate_no_unknown_params(&endpoint.fields, &params);
        errors.extend(validate_request(&endpoint.fields, &params));
        if !errors.is_empty() {
            return Err(GatewayError::validation(errors));
        }

        let (sql, mut bind_params) = render_template(&endpoint.template_source, &endpoint.fields, &params)?;
        let (sql, pagination) = apply_pagination(&sql, &mut bind_params, &params);

        let result: QueryResult = self.executor.execute(&sql, &bind_params).await?;
        Ok(RestResponseEnvelope { success: true, data: result.rows, pagination })
    }
}

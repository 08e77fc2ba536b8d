//! Unified error taxonomy for the flAPI gateway runtime.
//!
//! Every internal API returns `GatewayResult<T>` so that handlers at the HTTP
//! and JSON-RPC boundaries can translate failures into the envelopes
//! described by the gateway's external interfaces without re-deriving the
//! mapping at each call site.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// The category tag carried in every error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCategory {
    Configuration,
    Database,
    Validation,
    Authentication,
    NotFound,
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Configuration | Self::Database | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "Configuration",
            Self::Database => "Database",
            Self::Validation => "Validation",
            Self::Authentication => "Authentication",
            Self::NotFound => "NotFound",
            Self::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// The gateway's error value type, classified per spec §7.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Validation failed")]
    Validation { errors: Vec<FieldError> },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// One field-level validation failure, as produced by the request validator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field_name: String,
    pub error_message: String,
}

impl FieldError {
    pub fn new(field_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            error_message: error_message.into(),
        }
    }
}

impl GatewayError {
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Database { .. } => ErrorCategory::Database,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.category().status()
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { errors }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// REST error envelope: `{success: false, error: {category, message, details?}}`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let category = self.category();

        let (message, details) = match &self {
            Self::Validation { errors } => (
                errors
                    .first()
                    .map_or_else(|| "Validation failed".to_string(), |e| e.error_message.clone()),
                Some(serde_json::json!({ "errors": errors })),
            ),
            other => (other.to_string(), None),
        };

        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                category,
                message,
                details,
            },
        };

        (status, Json(envelope)).into_response()
    }
}

/// JSON-RPC 2.0 error codes from spec §6.
pub mod jsonrpc {
    use serde::Serialize;

    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    #[derive(Debug, Clone, Serialize)]
    pub struct JsonRpcError {
        pub code: i64,
        pub message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub data: Option<serde_json::Value>,
    }

    impl JsonRpcError {
        #[must_use]
        pub fn new(code: i64, message: impl Into<String>) -> Self {
            Self {
                code,
                message: message.into(),
                data: None,
            }
        }

        #[must_use]
        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        #[must_use]
        pub fn parse_error() -> Self {
            Self::new(PARSE_ERROR, "Parse error")
        }

        #[must_use]
        pub fn invalid_request(message: impl Into<String>) -> Self {
            Self::new(INVALID_REQUEST, message)
        }

        #[must_use]
        pub fn method_not_found(method: &str) -> Self {
            Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
        }

        #[must_use]
        pub fn invalid_params(message: impl Into<String>) -> Self {
            Self::new(INVALID_PARAMS, message)
        }

        #[must_use]
        pub fn internal(message: impl Into<String>) -> Self {
            Self::new(INTERNAL_ERROR, message)
        }
    }

    impl From<super::GatewayError> for JsonRpcError {
        fn from(err: super::GatewayError) -> Self {
            match err {
                super::GatewayError::Authentication { message } => {
                    Self::new(-32001, message)
                }
                other => Self::internal(other.to_string()),
            }
        }
    }
}

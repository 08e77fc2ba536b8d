//! Request validation pipeline (spec §4.2).

mod sql_injection;

pub use sql_injection::check_sql_injection;

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use flapi_error::FieldError;

use crate::endpoint::{RequestFieldConfig, RequestLocation};

/// One field validator, tagged by variant as in spec §3's `ValidatorConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorConfig {
    String {
        #[serde(default)]
        min: usize,
        #[serde(default)]
        max: usize,
        #[serde(default)]
        regex: String,
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
    Int {
        #[serde(default)]
        min: i64,
        #[serde(default)]
        max: i64,
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
    Email {
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
    Uuid {
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
    Date {
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
    Time {
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
    Enum {
        allowed_values: Vec<String>,
        #[serde(default = "default_true")]
        prevent_sql_injection: bool,
    },
}

const fn default_true() -> bool {
    true
}

impl ValidatorConfig {
    #[must_use]
    pub const fn prevent_sql_injection(&self) -> bool {
        match self {
            Self::String { prevent_sql_injection, .. }
            | Self::Int { prevent_sql_injection, .. }
            | Self::Email { prevent_sql_injection }
            | Self::Uuid { prevent_sql_injection }
            | Self::Date { prevent_sql_injection, .. }
            | Self::Time { prevent_sql_injection, .. }
            | Self::Enum { prevent_sql_injection, .. } => *prevent_sql_injection,
        }
    }
}

fn email_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid regex")
    })
}

fn uuid_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("valid regex")
    })
}

fn date_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

fn time_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}:\d{2}:\d{2}$").expect("valid regex"))
}

/// Runs one validator against `value`, accumulating zero or more errors.
fn run_validator(validator: &ValidatorConfig, value: &str, errors: &mut Vec<String>) {
    match validator {
        ValidatorConfig::String { min, max, regex, .. } => {
            if *min > 0 && value.len() < *min {
                errors.push(format!("String is shorter than the minimum length of {min}"));
            }
            if *max > 0 && value.len() > *max {
                errors.push(format!("String is longer than the maximum length of {max}"));
            }
            if !regex.is_empty() {
                match Regex::new(regex) {
                    Ok(re) => {
                        let full = re
                            .find(value)
                            .is_some_and(|m| m.start() == 0 && m.end() == value.len());
                        if !full {
                            errors.push("String does not match the required pattern".to_string());
                        }
                    }
                    Err(_) => errors.push("Invalid validator configuration".to_string()),
                }
            }
        }
        ValidatorConfig::Int { min, max, .. } => match value.parse::<i64>() {
            Ok(n) => {
                if *min != 0 && n < *min {
                    errors.push("Integer is less than the minimum allowed value".to_string());
                }
                if *max != 0 && n > *max {
                    errors.push("Integer is greater than the maximum allowed value".to_string());
                }
            }
            Err(_) => errors.push("Value is not a valid integer".to_string()),
        },
        ValidatorConfig::Email { .. } => {
            if !email_regex().is_match(value) {
                errors.push("Value is not a valid email address".to_string());
            }
        }
        ValidatorConfig::Uuid { .. } => {
            if !uuid_regex().is_match(value) {
                errors.push("Value is not a valid UUID".to_string());
            }
        }
        ValidatorConfig::Date { min, max, .. } => {
            if !date_regex().is_match(value) {
                errors.push("Value is not a valid date (YYYY-MM-DD)".to_string());
            } else {
                if let Some(min) = min {
                    if value < min.as_str() {
                        errors.push("Date is before the minimum allowed date".to_string());
                    }
                }
                if let Some(max) = max {
                    if value > max.as_str() {
                        errors.push("Date is after the maximum allowed date".to_string());
                    }
                }
            }
        }
        ValidatorConfig::Time { min, max, .. } => {
            if !time_regex().is_match(value) {
                errors.push("Value is not a valid time (HH:MM:SS)".to_string());
            } else {
                if let Some(min) = min {
                    if value < min.as_str() {
                        errors.push("Time is before the minimum allowed time".to_string());
                    }
                }
                if let Some(max) = max {
                    if value > max.as_str() {
                        errors.push("Time is after the maximum allowed time".to_string());
                    }
                }
            }
        }
        ValidatorConfig::Enum { allowed_values, .. } => {
            if !allowed_values.iter().any(|v| v == value) {
                errors.push("Value is not one of the allowed values".to_string());
            }
        }
    }
}

/// Given an endpoint's field list and a parameter mapping, produces an
/// ordered list of field-level errors (spec §4.2).
#[must_use]
pub fn validate_request(
    fields: &[RequestFieldConfig],
    params: &HashMap<String, String>,
) -> Vec<FieldError> {
    let mut out = Vec::new();

    for field in fields {
        let value = params.get(&field.field_name);

        let Some(value) = value.or(field.default.as_ref()) else {
            if field.required {
                out.push(FieldError::new(
                    &field.field_name,
                    format!("Field '{}' is required", field.field_name),
                ));
            }
            continue;
        };

        let mut messages = Vec::new();
        for validator in &field.validators {
            run_validator(validator, value, &mut messages);
        }

        let run_injection_check =
            field.validators.iter().any(ValidatorConfig::prevent_sql_injection);
        if run_injection_check {
            if let Some(msg) = check_sql_injection(value) {
                messages.push(msg);
            }
        }

        for message in messages {
            out.push(FieldError::new(&field.field_name, message));
        }
    }

    out
}

/// Strict unknown-parameter validation: flags parameters not present in the
/// field list. `offset` and `limit` are always permitted.
#[must_use]
pub fn validate_no_unknown_params(
    fields: &[RequestFieldConfig],
    params: &HashMap<String, String>,
) -> Vec<FieldError> {
    let known: std::collections::HashSet<&str> =
        fields.iter().map(|f| f.field_name.as_str()).collect();

    params
        .keys()
        .filter(|name| {
            let name = name.as_str();
            name != "offset" && name != "limit" && !known.contains(name)
        })
        .map(|name| FieldError::new(name, format!("Unknown parameter '{name}'")))
        .collect()
}

fn location(loc: RequestLocation) -> &'static str {
    match loc {
        RequestLocation::Query => "query",
        RequestLocation::Path => "path",
        RequestLocation::Header => "header",
        RequestLocation::Body => "body",
    }
}

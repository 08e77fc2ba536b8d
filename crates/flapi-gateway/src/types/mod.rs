//! Process-wide type converter registry mapping engine column types to JSON
//! values (spec §4.8). Complex types (decimal, temporal, list/struct/map)
//! are handled by the executor directly via engine-provided introspection;
//! this registry covers scalars only.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

/// A converter from a raw column value (already decoded to a Rust scalar by
/// the engine's driver) to the gateway's JSON value model.
pub type Converter = fn(&str) -> Value;

fn convert_bool(raw: &str) -> Value {
    Value::Bool(matches!(raw, "t" | "true" | "1" | "TRUE" | "True"))
}

fn convert_int(raw: &str) -> Value {
    raw.parse::<i64>().map_or(Value::Null, Value::from)
}

fn convert_uint(raw: &str) -> Value {
    raw.parse::<u64>().map_or(Value::Null, Value::from)
}

fn convert_float(raw: &str) -> Value {
    raw.parse::<f64>().map_or(Value::Null, |f| {
        serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
    })
}

fn convert_string(raw: &str) -> Value {
    Value::String(raw.to_string())
}

/// Column type names as reported by the query engine's driver.
const DEFAULT_CONVERTERS: &[(&str, Converter)] = &[
    ("boolean", convert_bool),
    ("bool", convert_bool),
    ("tinyint", convert_int),
    ("smallint", convert_int),
    ("integer", convert_int),
    ("int", convert_int),
    ("bigint", convert_int),
    ("utinyint", convert_uint),
    ("usmallint", convert_uint),
    ("uinteger", convert_uint),
    ("ubigint", convert_uint),
    ("float", convert_float),
    ("real", convert_float),
    ("double", convert_float),
    ("varchar", convert_string),
    ("text", convert_string),
    ("string", convert_string),
];

/// The process-wide registry. Populated once with the defaults above;
/// operators may register additional converters for engine-specific types.
pub struct TypeConverterRegistry {
    converters: HashMap<String, Converter>,
}

impl TypeConverterRegistry {
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut converters = HashMap::new();
        for (name, f) in DEFAULT_CONVERTERS {
            converters.insert((*name).to_string(), *f);
        }
        Self { converters }
    }

    pub fn register(&mut self, type_name: impl Into<String>, converter: Converter) {
        self.converters.insert(type_name.into(), converter);
    }

    /// Converts `raw` using the registered converter for `type_name`, or
    /// falls back to stringification when the type is unknown to the
    /// registry (complex types go through the executor's own introspection
    /// instead of this path).
    #[must_use]
    pub fn convert(&self, type_name: &str, raw: Option<&str>) -> Value {
        let Some(raw) = raw else {
            return Value::Null;
        };
        self.converters
            .get(&type_name.to_ascii_lowercase())
            .map_or_else(|| convert_string(raw), |f| f(raw))
    }
}

/// Process-wide singleton accessor (spec §4.8: "Process-wide singleton").
pub fn registry() -> &'static TypeConverterRegistry {
    static REGISTRY: OnceLock<TypeConverterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TypeConverterRegistry::with_defaults)
}

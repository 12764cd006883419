use serde_json::{Map, Value};
use statbridge_core::error::{ToolError, codes};

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

// Tool arguments reach executors already validated against the tool's
// schema, so these read values as given. Absence is still reported rather
// than assumed away.

pub fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing_arg(key, "must be a string"))
}

pub fn required_i64(args: &Map<String, Value>, key: &str) -> Result<i64, ToolError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing_arg(key, "must be an integer"))
}

pub fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn optional_i64(args: &Map<String, Value>, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

/// Render a scalar JSON value as a query-string value.
pub fn scalar_to_string(value: &Value, field: &str) -> Result<String, ToolError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(missing_arg(field, "must be a string, number or boolean")),
    }
}

fn missing_arg(key: &str, problem: &str) -> ToolError {
    ToolError::new(codes::VALIDATION_FAILED, format!("argument '{key}' {problem}")).with_field(key)
}

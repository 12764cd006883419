use serde_json::{Value, json};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const INTERNAL_ERROR: i64 = -32603;

/// Protocol-level error object carried in a response envelope.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            code: PARSE_ERROR,
            message: "Parse error".to_string(),
            data: Some(json!({ "detail": detail.into() })),
        }
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: "Invalid Request".to_string(),
            data: Some(json!({ "detail": detail.into() })),
        }
    }

    /// Unknown methods share the internal-fault code.
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: format!("Invalid params: {}", detail.into()),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

/// A structurally valid request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Caller-supplied identifier, `null` when absent.
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl Request {
    /// Check envelope shape. On failure returns the identifier to answer with
    /// (the request's own when it is usable, otherwise `null`).
    pub fn parse(incoming: &Value) -> Result<Self, (Value, RpcError)> {
        let Some(obj) = incoming.as_object() else {
            return Err((
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        let id = match obj.get("id") {
            None | Some(Value::Null) => Value::Null,
            Some(id @ (Value::String(_) | Value::Number(_))) => id.clone(),
            Some(_) => {
                return Err((
                    Value::Null,
                    RpcError::invalid_request("id must be a string, number or null"),
                ));
            }
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err((id, RpcError::invalid_request("jsonrpc must be '2.0'")));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Err((id, RpcError::invalid_request("method must be a string")));
        };

        let params = match obj.get("params") {
            None => Value::Null,
            Some(params @ (Value::Object(_) | Value::Null)) => params.clone(),
            Some(_) => {
                return Err((id, RpcError::invalid_request("params must be an object")));
            }
        };

        Ok(Self {
            id,
            method: method.to_string(),
            params,
        })
    }
}

/// True for a well-formed envelope that carries no `id` member.
pub fn is_notification(message: &Value) -> bool {
    message.as_object().is_some_and(|obj| {
        !obj.contains_key("id")
            && obj.get("method").is_some_and(Value::is_string)
            && obj.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION)
    })
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

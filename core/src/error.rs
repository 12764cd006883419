use serde_json::Value;
use thiserror::Error;

/// Machine-readable codes carried by tool-level failures.
pub mod codes {
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UPSTREAM_UNREACHABLE: &str = "upstream_unreachable";
    pub const UPSTREAM_STATUS: &str = "upstream_status";
    pub const INVALID_RESPONSE: &str = "invalid_response";
}

/// Failure reported by a tool executor.
///
/// Surfaced to callers as an error-flagged tool result, never as a
/// protocol-level error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub docs_hint: Option<String>,
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Human-readable rendering used as the text of an error-flagged result.
    pub fn diagnostic(&self) -> String {
        let mut text = format!("[{}] {}", self.code, self.message);
        if let Some(field) = &self.field {
            text.push_str(&format!(" (field: {field})"));
        }
        if let Some(details) = &self.details {
            text.push_str(&format!("\nDetails: {details}"));
        }
        if let Some(docs_hint) = &self.docs_hint {
            text.push_str(&format!("\nHint: {docs_hint}"));
        }
        text
    }
}

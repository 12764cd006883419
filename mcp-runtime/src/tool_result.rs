use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::util::to_pretty_json;

/// Payload returned for a `tools/call` request.
///
/// When `is_error` is set the text is a human-readable diagnostic, not data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolCallResult {
    pub fn success(payload: &Value) -> Self {
        let text = match payload {
            Value::String(raw) => raw.clone(),
            other => to_pretty_json(other),
        };
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: false,
        }
    }

    pub fn error(diagnostic: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: diagnostic.into(),
            }],
            is_error: true,
        }
    }

    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            json!({
                "content": [{ "type": "text", "text": format!("Failed to encode tool result: {err}") }],
                "isError": true
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_pretty_prints_structured_payloads() {
        let result = ToolCallResult::success(&json!({ "year": 2023 }));
        assert_eq!(
            result.to_value(),
            json!({
                "content": [{ "type": "text", "text": "{\n  \"year\": 2023\n}" }],
                "isError": false
            })
        );
    }

    #[test]
    fn success_passes_strings_through_verbatim() {
        let result = ToolCallResult::success(&json!("region,value\nBE,1\n"));
        assert_eq!(result.text(), "region,value\nBE,1\n");
    }

    #[test]
    fn error_sets_flag() {
        let result = ToolCallResult::error("Unknown tool: nope");
        let value = result.to_value();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["text"], "Unknown tool: nope");
    }
}

//! Message types for agent conversations

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Tool call ID this message answers (for tool results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create an assistant message with tool calls
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        let tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        };
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls,
        }
    }

    /// Create a tool result message correlated to a tool call
    pub fn tool_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: result.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }

    /// Check whether this assistant message requests tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map_or(false, |c| !c.is_empty())
    }
}

/// A tool call request emitted by the model.
///
/// `arguments` is the raw, untrusted payload as the provider sent it:
/// either a JSON object or a stringified JSON blob. It is normalized
/// to an argument map just before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    /// Normalize the raw argument payload to a plain JSON object.
    ///
    /// Stringified JSON is parsed; an unparseable or non-object payload
    /// degrades to an empty argument set so the tool handler can report
    /// its own missing-field error back to the model.
    pub fn parsed_arguments(&self) -> serde_json::Value {
        let value = match &self.arguments {
            serde_json::Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or(serde_json::Value::Null)
            }
            other => other.clone(),
        };

        if value.is_object() {
            value
        } else {
            serde_json::json!({})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_assistant_with_empty_tool_calls_has_none() {
        let msg = Message::assistant_with_tools("hi", vec![]);
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_parsed_arguments_object_passthrough() {
        let call = ToolCallRequest {
            id: "tc_1".to_string(),
            name: "read_file".to_string(),
            arguments: json!({"path": "a.txt"}),
        };
        assert_eq!(call.parsed_arguments(), json!({"path": "a.txt"}));
    }

    #[test]
    fn test_parsed_arguments_stringified_json() {
        let call = ToolCallRequest {
            id: "tc_1".to_string(),
            name: "read_file".to_string(),
            arguments: json!(r#"{"path": "a.txt"}"#),
        };
        assert_eq!(call.parsed_arguments(), json!({"path": "a.txt"}));
    }

    #[test]
    fn test_parsed_arguments_garbage_degrades_to_empty() {
        let call = ToolCallRequest {
            id: "tc_1".to_string(),
            name: "read_file".to_string(),
            arguments: json!("{not json"),
        };
        assert_eq!(call.parsed_arguments(), json!({}));
    }
}

//! Groq provider (OpenAI-compatible chat completions API).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::agent::message::{Message, Role, ToolCallRequest};
use crate::agent::router::ModelTier;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::{ChatResponse, ErrorKind, LlmResponse, ProviderAdapter, Usage};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Groq API client with a fast/smart model pair.
#[derive(Clone)]
pub struct GroqClient {
    api_key: String,
    fast_model: String,
    smart_model: String,
    client: Client,
}

impl GroqClient {
    pub fn new(api_key: &str, fast_model: &str, smart_model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            fast_model: fast_model.to_string(),
            smart_model: smart_model.to_string(),
            client: Client::new(),
        }
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };

                if m.role == Role::Tool {
                    json!({
                        "role": role,
                        "tool_call_id": m.tool_call_id.as_deref().unwrap_or(""),
                        "content": m.content,
                    })
                } else if let Some(ref tool_calls) = m.tool_calls {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": raw_arguments(&tc.arguments),
                                }
                            })
                        })
                        .collect();

                    json!({
                        "role": role,
                        "content": m.content,
                        "tool_calls": calls,
                    })
                } else {
                    json!({
                        "role": role,
                        "content": m.content,
                    })
                }
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn parse_response(&self, response: ChatResponse) -> Result<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("No choices in response".to_string()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                // Kept as the raw stringified payload; the loop parses it.
                arguments: Value::String(tc.function.arguments),
            })
            .collect();

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

/// Tool-call arguments must go back to the provider as a string.
fn raw_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ProviderAdapter for GroqClient {
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<LlmResponse> {
        let mut request = json!({
            "model": model,
            "messages": self.convert_messages(messages),
            "max_tokens": 4096,
        });

        if !tools.is_empty() {
            request["tools"] = Value::Array(self.convert_tools(tools));
            request["tool_choice"] = json!("auto");
        }

        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!(
                "Groq API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await?;
        self.parse_response(chat_response)
    }

    fn classify_error(&self, err: &Error) -> ErrorKind {
        let text = err.to_string().to_lowercase();

        if text.contains("rate_limit") || text.contains("429") || text.contains("too many") {
            return ErrorKind::RateLimited;
        }
        if text.contains("tool_use_failed") {
            return ErrorKind::ToolUseRejected;
        }
        if text.contains("model")
            && (text.contains("not found")
                || text.contains("unavailable")
                || text.contains("decommissioned")
                || text.contains("does not exist"))
        {
            return ErrorKind::ModelUnavailable;
        }

        ErrorKind::Other
    }

    fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Smart => &self.smart_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GroqClient {
        GroqClient::new("gsk_test", "llama-3.1-8b-instant", "llama-3.3-70b-versatile")
    }

    #[test]
    fn test_classify_rate_limit() {
        let c = client();
        let err = Error::Llm("Groq API error (429): rate_limit_exceeded".to_string());
        assert_eq!(c.classify_error(&err), ErrorKind::RateLimited);
    }

    #[test]
    fn test_classify_model_unavailable() {
        let c = client();
        let err = Error::Llm("Groq API error (404): model `x` not found".to_string());
        assert_eq!(c.classify_error(&err), ErrorKind::ModelUnavailable);
    }

    #[test]
    fn test_classify_tool_use_rejected() {
        let c = client();
        let err = Error::Llm("Groq API error (400): tool_use_failed".to_string());
        assert_eq!(c.classify_error(&err), ErrorKind::ToolUseRejected);
    }

    #[test]
    fn test_classify_other() {
        let c = client();
        let err = Error::Llm("Groq API error (500): internal".to_string());
        assert_eq!(c.classify_error(&err), ErrorKind::Other);
    }

    #[test]
    fn test_model_id_per_tier() {
        let c = client();
        assert_eq!(c.model_id(ModelTier::Fast), "llama-3.1-8b-instant");
        assert_eq!(c.model_id(ModelTier::Smart), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_convert_messages_tool_result_shape() {
        let c = client();
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::tool_result("tc_1", "file contents"),
        ];
        let converted = c.convert_messages(&messages);
        assert_eq!(converted[2]["role"], "tool");
        assert_eq!(converted[2]["tool_call_id"], "tc_1");
        assert_eq!(converted[2]["content"], "file contents");
    }

    #[test]
    fn test_convert_messages_assistant_tool_calls_stringified() {
        let c = client();
        let call = ToolCallRequest {
            id: "tc_1".to_string(),
            name: "read_file".to_string(),
            arguments: serde_json::json!({"path": "a.txt"}),
        };
        let messages = vec![Message::assistant_with_tools("", vec![call])];
        let converted = c.convert_messages(&messages);
        let args = converted[0]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap();
        assert!(args.contains("a.txt"));
    }
}

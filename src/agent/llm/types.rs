//! Wire types for OpenAI-compatible chat completion responses.

use serde::Deserialize;

/// Top-level chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<UsageInfo>,
}

/// A single response choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message inside a choice.
#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallPayload>>,
}

/// A tool call as the provider emits it.
#[derive(Debug, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    pub function: FunctionPayload,
}

/// Function name + stringified JSON arguments.
#[derive(Debug, Deserialize)]
pub struct FunctionPayload {
    pub name: String,
    pub arguments: String,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: Option<usize>,
    pub completion_tokens: Option<usize>,
    pub total_tokens: Option<usize>,
}

//! LLM provider abstraction layer.
//!
//! This module provides:
//! - [`ProviderAdapter`] trait for swappable completion providers
//! - [`LlmResponse`] - the verbatim structured provider response
//! - [`ErrorKind`] - transient-failure classification used by the
//!   completion client's retry/fallback logic
//! - Concrete implementation: [`GroqClient`]
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `openai.rs`)
//! 2. Implement `ProviderAdapter`: payload shaping in `send`, error
//!    classification in `classify_error`, tier mapping in `model_id`
//! 3. Wire it up in `Session::new`

mod types;

pub mod groq;

pub use groq::GroqClient;
pub use types::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::message::{Message, ToolCallRequest};
use super::router::ModelTier;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Reason the response finished.
    pub finish_reason: String,

    /// Token usage statistics.
    pub usage: Usage,
}

impl LlmResponse {
    /// Create a simple text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// Check if the response has tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Classification of a failed completion attempt.
///
/// Drives the retry policy: rate limits and model outages downgrade the
/// smart tier to the fast tier; everything else backs off and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Provider rate/quota limiting (429, "too many requests").
    RateLimited,
    /// Requested model missing or temporarily unavailable.
    ModelUnavailable,
    /// Provider rejected the declared tool-call shape.
    ToolUseRejected,
    /// Anything else.
    Other,
}

/// Completion provider - payload shaping and error classification.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Send one completion request and return the provider's response
    /// verbatim. No retry logic here; that lives in the completion
    /// client.
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<LlmResponse>;

    /// Classify a failed attempt for the retry policy.
    fn classify_error(&self, err: &Error) -> ErrorKind;

    /// Concrete model id for a tier.
    fn model_id(&self, tier: ModelTier) -> &str;
}

/// Scripted provider for tests. Pops one result per `send` call and
/// records which model each attempt targeted.
#[cfg(test)]
pub struct FakeAdapter {
    results: std::sync::Mutex<std::collections::VecDeque<Result<LlmResponse>>>,
    pub models_seen: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FakeAdapter {
    pub fn new(results: Vec<Result<LlmResponse>>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into_iter().collect()),
            models_seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Adapter that answers every request with plain text.
    pub fn with_texts(texts: Vec<&str>) -> Self {
        Self::new(texts.iter().map(|t| Ok(LlmResponse::text(*t))).collect())
    }

    /// Adapter that emits one tool call, then a final text answer.
    pub fn with_tool_call(name: &str, args: serde_json::Value, final_text: &str) -> Self {
        let tool_response = LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "tc_1".to_string(),
                name: name.to_string(),
                arguments: args,
            }],
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        };
        Self::new(vec![Ok(tool_response), Ok(LlmResponse::text(final_text))])
    }

    /// Adapter that emits tool calls forever (for bounded-termination tests).
    pub fn endless_tool_calls() -> Self {
        Self {
            results: std::sync::Mutex::new(std::collections::VecDeque::new()),
            models_seen: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ProviderAdapter for FakeAdapter {
    async fn send(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        model: &str,
    ) -> Result<LlmResponse> {
        self.models_seen.lock().unwrap().push(model.to_string());
        let mut results = self.results.lock().unwrap();
        match results.pop_front() {
            Some(result) => result,
            // Empty script means: keep asking for tools.
            None => Ok(LlmResponse {
                content: None,
                tool_calls: vec![ToolCallRequest {
                    id: format!("tc_{}", self.models_seen.lock().unwrap().len()),
                    name: "list_files".to_string(),
                    arguments: serde_json::json!({}),
                }],
                finish_reason: "tool_calls".to_string(),
                usage: Usage::default(),
            }),
        }
    }

    fn classify_error(&self, err: &Error) -> ErrorKind {
        match err {
            Error::Llm(msg) if msg.contains("rate limit") => ErrorKind::RateLimited,
            Error::Llm(msg) if msg.contains("model unavailable") => ErrorKind::ModelUnavailable,
            Error::Llm(msg) if msg.contains("tool_use_failed") => ErrorKind::ToolUseRejected,
            _ => ErrorKind::Other,
        }
    }

    fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => "fake-fast",
            ModelTier::Smart => "fake-smart",
        }
    }
}

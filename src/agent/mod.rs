//! Agent module - the orchestration core.
//!
//! This module contains:
//! - Message and conversation types with history trimming
//! - Model router (fast/smart tier selection with daily quota)
//! - Completion client (retry and cross-tier fallback)
//! - Provider adapter trait and the Groq implementation
//! - The orchestration loop tying it all together

mod client;
mod conversation;
mod loop_impl;
mod message;
pub mod router;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use client::CompletionClient;
pub use conversation::Conversation;
pub use llm::{ErrorKind, GroqClient, LlmResponse, ProviderAdapter, Usage};
pub use loop_impl::{AgentLoop, Outcome};
pub use message::{Message, Role, ToolCallRequest};
pub use router::{ModelQuota, ModelTier};

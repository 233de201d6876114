//! Conversation store - ordered message log with trimming policy.
//!
//! The store always begins with exactly one system message which is
//! never evicted. Trimming keeps the most recent messages and drops
//! any leading tool result whose assistant turn fell off the window,
//! since a tool message without its preceding assistant turn is
//! structurally invalid and must never be sent to the provider.

use super::message::{Message, Role};

/// Ordered, append-only (until trimmed) conversation log.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    max_messages: usize,
}

impl Conversation {
    /// Create a conversation seeded with a system prompt.
    pub fn new(system_prompt: impl Into<String>, max_messages: usize) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            max_messages,
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Reset back to just the system message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    /// Remove the trailing user message, if the last message is one.
    ///
    /// Failure-path rollback: after an unrecoverable completion error the
    /// triggering user turn is discarded so a retry starts clean.
    pub fn pop_user(&mut self) {
        if self.messages.last().map(|m| m.role) == Some(Role::User) {
            self.messages.pop();
        }
    }

    /// Trim history to the configured ceiling.
    ///
    /// Keeps the system message plus the most recent non-system messages,
    /// then drops leading tool results orphaned by the cut.
    pub fn trim(&mut self) {
        if self.messages.len() <= self.max_messages {
            return;
        }

        let system: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .cloned()
            .collect();
        let rest: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();

        let keep = self.max_messages.saturating_sub(system.len());
        let mut trimmed: Vec<Message> = rest[rest.len().saturating_sub(keep)..].to_vec();

        while trimmed.first().map(|m| m.role) == Some(Role::Tool) {
            trimmed.remove(0);
        }

        self.messages = system;
        self.messages.extend(trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::ToolCallRequest;
    use serde_json::json;

    fn tool_call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: "read_file".to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn test_starts_with_system() {
        let conv = Conversation::new("preamble", 50);
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
    }

    #[test]
    fn test_reset_keeps_only_system() {
        let mut conv = Conversation::new("preamble", 50);
        conv.push(Message::user("hi"));
        conv.push(Message::assistant("hello"));
        conv.reset();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content, "preamble");
    }

    #[test]
    fn test_pop_user_rolls_back_trailing_user_only() {
        let mut conv = Conversation::new("preamble", 50);
        conv.push(Message::user("hi"));
        conv.pop_user();
        assert_eq!(conv.len(), 1);

        conv.push(Message::user("hi"));
        conv.push(Message::assistant("hello"));
        conv.pop_user();
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn test_trim_noop_under_ceiling() {
        let mut conv = Conversation::new("preamble", 50);
        for i in 0..10 {
            conv.push(Message::user(format!("msg {}", i)));
        }
        conv.trim();
        assert_eq!(conv.len(), 11);
    }

    #[test]
    fn test_trim_keeps_system_first_and_recent_tail() {
        let mut conv = Conversation::new("preamble", 50);
        for i in 0..60 {
            conv.push(Message::user(format!("msg {}", i)));
        }
        conv.trim();

        assert_eq!(conv.len(), 50);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[1].content, "msg 11");
        assert_eq!(conv.messages()[49].content, "msg 59");
    }

    #[test]
    fn test_trim_drops_orphaned_leading_tool_result() {
        // 60 non-system messages where the cut lands on a tool result:
        // the orphan must be dropped so the window starts with a
        // user or assistant message.
        let mut conv = Conversation::new("preamble", 50);
        for i in 0..20 {
            conv.push(Message::user(format!("ask {}", i)));
            conv.push(Message::assistant_with_tools("", vec![tool_call(&format!("tc_{}", i))]));
            conv.push(Message::tool_result(format!("tc_{}", i), "result"));
        }
        assert_eq!(conv.len(), 61);

        conv.trim();

        assert_eq!(conv.messages()[0].role, Role::System);
        let first_non_system = &conv.messages()[1];
        assert_ne!(first_non_system.role, Role::Tool);
        assert!(conv.len() <= 50);
    }

    #[test]
    fn test_trim_is_idempotent() {
        let mut conv = Conversation::new("preamble", 50);
        for i in 0..80 {
            conv.push(Message::user(format!("msg {}", i)));
        }
        conv.trim();
        let after_first: Vec<String> =
            conv.messages().iter().map(|m| m.content.clone()).collect();
        conv.trim();
        let after_second: Vec<String> =
            conv.messages().iter().map(|m| m.content.clone()).collect();
        assert_eq!(after_first, after_second);
    }
}

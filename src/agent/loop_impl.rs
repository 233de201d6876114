//! Orchestration loop - drives one user message to convergence.
//!
//! State machine: append the user turn, route a model tier, then
//! alternate completion calls and tool dispatch until the model answers
//! with plain text or the iteration cap is hit. Tool calls within an
//! assistant turn run sequentially in emission order, so side effects
//! are deterministic.

use tracing::{debug, info};

use super::client::CompletionClient;
use super::conversation::Conversation;
use super::llm::ProviderAdapter;
use super::message::Message;
use super::router::{self, ModelQuota};
use crate::tools::{truncate_output, ToolRunner};
use crate::Result;

/// Cap on a single tool result fed back to the model.
const TOOL_RESULT_CAP: usize = 8_000;

/// Terminal state of one loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The model produced a plain-text answer.
    Done(String),
    /// The iteration cap was hit before the model converged.
    /// Not an error: conversation state is preserved for the next turn.
    IterationLimit,
}

/// The agent loop processes one user message through completion and
/// tool execution cycles.
pub struct AgentLoop<P: ProviderAdapter> {
    client: CompletionClient<P>,
    max_iterations: usize,
    max_retries: usize,
}

impl<P: ProviderAdapter> AgentLoop<P> {
    pub fn new(client: CompletionClient<P>, max_iterations: usize, max_retries: usize) -> Self {
        Self {
            client,
            max_iterations,
            max_retries,
        }
    }

    /// Run the loop for a single user message.
    ///
    /// On an unrecoverable completion error the triggering user turn is
    /// removed from the conversation before the error propagates, so a
    /// failed turn never pollutes subsequent context.
    pub async fn run(
        &self,
        user_text: &str,
        conversation: &mut Conversation,
        tools: &ToolRunner,
        quota: &mut ModelQuota,
    ) -> Result<Outcome> {
        let tier = router::select_model(user_text, quota);
        info!("starting loop on {:?} tier", tier);

        conversation.push(Message::user(user_text));
        conversation.trim();

        let definitions = tools.definitions();

        for iteration in 0..self.max_iterations {
            debug!("iteration {}/{}", iteration + 1, self.max_iterations);

            let response = match self
                .client
                .complete(conversation.messages(), &definitions, tier, self.max_retries)
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    conversation.pop_user();
                    return Err(err);
                }
            };

            conversation.push(Message::assistant_with_tools(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            if !response.has_tool_calls() {
                let text = response.content.unwrap_or_default();
                info!("loop done after {} iteration(s), {} chars", iteration + 1, text.len());
                return Ok(Outcome::Done(text));
            }

            for call in &response.tool_calls {
                let args = call.parsed_arguments();
                let result = tools.dispatch(&call.name, args).await;
                let result = truncate_output(&result, TOOL_RESULT_CAP);
                conversation.push(Message::tool_result(&call.id, result));
            }
        }

        info!("iteration cap ({}) reached", self.max_iterations);
        Ok(Outcome::IterationLimit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::FakeAdapter;
    use crate::agent::message::Role;
    use crate::error::Error;
    use crate::tools::{DummyTool, ToolRunner};
    use serde_json::json;

    fn agent(adapter: FakeAdapter, max_iterations: usize) -> AgentLoop<FakeAdapter> {
        AgentLoop::new(CompletionClient::new(adapter), max_iterations, 3)
    }

    fn fixture() -> (Conversation, ToolRunner, ModelQuota) {
        (
            Conversation::new("preamble", 50),
            ToolRunner::new(),
            ModelQuota::new(800),
        )
    }

    #[tokio::test]
    async fn test_plain_text_answer() {
        let (mut conv, tools, mut quota) = fixture();
        let agent = agent(FakeAdapter::with_texts(vec!["Hello, human!"]), 10);

        let outcome = agent.run("hi", &mut conv, &tools, &mut quota).await.unwrap();

        assert_eq!(outcome, Outcome::Done("Hello, human!".to_string()));
        // system + user + assistant
        assert_eq!(conv.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let (mut conv, mut tools, mut quota) = fixture();
        tools.register(DummyTool {
            name: "list_files".to_string(),
            result: "Directory is empty.".to_string(),
        });
        let agent = agent(
            FakeAdapter::with_tool_call("list_files", json!({"directory": "."}), "Nothing there."),
            10,
        );

        let outcome = agent
            .run("list files on desktop", &mut conv, &tools, &mut quota)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done("Nothing there.".to_string()));
        // The keyword "list" routed to the fast tier, no quota spent.
        assert_eq!(quota.used_today(), 0);

        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(conv.messages()[3].content, "Directory is empty.");
        assert_eq!(conv.messages()[3].tool_call_id.as_deref(), Some("tc_1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_degrades_and_loop_continues() {
        let (mut conv, tools, mut quota) = fixture();
        let agent = agent(
            FakeAdapter::with_tool_call("no_such_tool", json!({}), "recovered"),
            10,
        );

        let outcome = agent.run("hi", &mut conv, &tools, &mut quota).await.unwrap();

        assert_eq!(outcome, Outcome::Done("recovered".to_string()));
        assert!(conv.messages()[3].content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_terminates_at_iteration_cap() {
        let (mut conv, mut tools, mut quota) = fixture();
        tools.register(DummyTool {
            name: "list_files".to_string(),
            result: "ok".to_string(),
        });
        // Adapter emits tool calls forever.
        let agent = agent(FakeAdapter::endless_tool_calls(), 5);

        let outcome = agent.run("loop", &mut conv, &tools, &mut quota).await.unwrap();

        assert_eq!(outcome, Outcome::IterationLimit);
        // All tool calls from the final assistant turn were dispatched:
        // every assistant turn has its tool result.
        let assistants = conv
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        let tool_results = conv
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(assistants, 5);
        assert_eq!(tool_results, 5);
    }

    #[tokio::test]
    async fn test_completion_failure_rolls_back_user_turn() {
        let (mut conv, tools, mut quota) = fixture();
        let agent = agent(
            FakeAdapter::new(vec![
                Err(Error::Llm("boom".to_string())),
                Err(Error::Llm("boom".to_string())),
                Err(Error::Llm("boom".to_string())),
            ]),
            10,
        );

        let err = agent.run("hi", &mut conv, &tools, &mut quota).await;

        assert!(err.is_err());
        // The triggering user turn was discarded.
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_oversized_tool_result_is_truncated() {
        let (mut conv, mut tools, mut quota) = fixture();
        tools.register(DummyTool {
            name: "read_file".to_string(),
            result: "x".repeat(20_000),
        });
        let agent = agent(
            FakeAdapter::with_tool_call("read_file", json!({"path": "big.txt"}), "done"),
            10,
        );

        agent.run("read it", &mut conv, &tools, &mut quota).await.unwrap();

        let tool_msg = conv
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.len() < 9_000);
        assert!(tool_msg.content.contains("truncated"));
    }
}

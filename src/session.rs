//! Interactive session - wires the agent loop, tools, and browser
//! bridge together and runs the REPL.

use std::io::{self, Write};

use tracing::info;

use crate::agent::{
    AgentLoop, CompletionClient, Conversation, GroqClient, ModelQuota, Outcome,
};
use crate::config::Config;
use crate::templates;
use crate::tools::{BrowserBridge, ToolRunner};
use crate::{ui, Result};

/// What a REPL input line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Reset,
    Status,
    Skip,
    Message(&'a str),
}

fn parse_command(input: &str) -> Command<'_> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Command::Skip;
    }
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" => Command::Exit,
        "reset" | "clear" => Command::Reset,
        "status" | "stats" => Command::Status,
        _ => Command::Message(trimmed),
    }
}

/// One chat session: a conversation, a daily quota, the tool set, and
/// the shared browser bridge.
pub struct Session {
    agent: AgentLoop<GroqClient>,
    conversation: Conversation,
    quota: ModelQuota,
    tools: ToolRunner,
    bridge: BrowserBridge,
    config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let bridge = BrowserBridge::new(config.bridge_port);
        let tools = ToolRunner::with_defaults(&config, bridge.clone());

        let client = GroqClient::new(&config.api_key, &config.fast_model, &config.smart_model);
        let agent = AgentLoop::new(
            CompletionClient::new(client),
            config.max_iterations,
            config.max_retries,
        );
        let conversation = Conversation::new(
            templates::system_prompt(&config.output_dir),
            config.max_history,
        );
        let quota = ModelQuota::new(config.smart_daily_cap);

        Self {
            agent,
            conversation,
            quota,
            tools,
            bridge,
            config,
        }
    }

    /// Process one user message to completion.
    pub async fn run_once(&mut self, text: &str) -> Result<String> {
        let outcome = self
            .agent
            .run(text, &mut self.conversation, &self.tools, &mut self.quota)
            .await?;
        Ok(match outcome {
            Outcome::Done(answer) => answer,
            Outcome::IterationLimit => {
                "I ran out of steps before finishing. The work done so far is kept - \
                 ask me to continue or narrow the task."
                    .to_string()
            }
        })
    }

    /// The REPL. `exit` quits, `reset` clears history, `status` prints
    /// session stats; anything else goes to the agent.
    pub async fn run_interactive(&mut self) -> Result<()> {
        ui::print_banner(
            &self.config.fast_model,
            &self.config.smart_model,
            &self.config.output_dir,
        );

        loop {
            print!("\x1b[1;34mYou\x1b[0m: ");
            io::stdout().flush()?;

            let mut input = String::new();
            if io::stdin().read_line(&mut input)? == 0 {
                break;
            }

            match parse_command(&input) {
                Command::Exit => {
                    println!("Bye!");
                    break;
                }
                Command::Reset => {
                    self.conversation.reset();
                    ui::print_step("History cleared.");
                }
                Command::Status => self.print_status(),
                Command::Skip => continue,
                Command::Message(text) => match self.run_once(text).await {
                    Ok(answer) => println!("\n\x1b[1;32mdeskhand\x1b[0m: {}\n", answer),
                    // The failed turn was already rolled back; keep going.
                    Err(e) => ui::print_error(&e.to_string()),
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn print_status(&self) {
        ui::print_step(&format!(
            "smart model: {}/{} requests today",
            self.quota.used_today(),
            self.quota.daily_cap()
        ));
        ui::print_step(&format!("history: {} messages", self.conversation.len()));
        ui::print_step(&format!(
            "browser: {}",
            if self.bridge.is_connected() {
                "connected"
            } else {
                "not connected"
            }
        ));
        ui::print_step(&format!("tools: {}", self.tools.tool_names().len()));
    }

    /// Tear down external resources.
    pub async fn shutdown(&self) {
        info!("session shutting down");
        self.bridge.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_keywords() {
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("  QUIT  "), Command::Exit);
        assert_eq!(parse_command("reset"), Command::Reset);
        assert_eq!(parse_command("clear"), Command::Reset);
        assert_eq!(parse_command("Status"), Command::Status);
        assert_eq!(parse_command("stats"), Command::Status);
    }

    #[test]
    fn test_parse_command_skips_blank_lines() {
        assert_eq!(parse_command(""), Command::Skip);
        assert_eq!(parse_command("   \n"), Command::Skip);
    }

    #[test]
    fn test_parse_command_passes_messages_through() {
        assert_eq!(
            parse_command("  open example.com  "),
            Command::Message("open example.com")
        );
        // Command words inside a sentence are not commands.
        assert_eq!(
            parse_command("please reset my password"),
            Command::Message("please reset my password")
        );
    }
}

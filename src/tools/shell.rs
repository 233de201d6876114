//! Shell tool - run system commands with a hard timeout.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;

use super::{truncate_output, Tool};
use crate::error::Error;
use crate::Result;

/// Hard ceiling on command runtime.
const COMMAND_TIMEOUT_SECS: u64 = 30;
/// Cap on combined command output.
const OUTPUT_CAP: usize = 5_000;

/// Run a shell command and return its combined output
pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }
    fn description(&self) -> &str {
        "Run a shell command and return the output"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let command = params
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'command' parameter".to_string()))?;

        let run = Command::new("sh").arg("-c").arg(command).output();

        let output = match tokio::time::timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS), run).await
        {
            Ok(result) => {
                result.map_err(|e| Error::Tool(format!("Failed to execute command: {}", e)))?
            }
            Err(_) => {
                return Ok(format!(
                    "Command timed out after {} seconds.",
                    COMMAND_TIMEOUT_SECS
                ))
            }
        };

        // Exit status is not surfaced separately; combined output is what
        // the model reads, matching how a human would inspect a terminal.
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if combined.trim().is_empty() {
            Ok("Command executed (no output).".to_string())
        } else {
            Ok(truncate_output(&combined, OUTPUT_CAP))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_echo() {
        let result = RunCommandTool
            .execute(json!({"command": "echo 'Hello, World!'"}))
            .await
            .unwrap();
        assert!(result.contains("Hello, World!"));
    }

    #[tokio::test]
    async fn test_no_output_placeholder() {
        let result = RunCommandTool
            .execute(json!({"command": "true"}))
            .await
            .unwrap();
        assert_eq!(result, "Command executed (no output).");
    }

    #[tokio::test]
    async fn test_stderr_included() {
        let result = RunCommandTool
            .execute(json!({"command": "echo oops >&2"}))
            .await
            .unwrap();
        assert!(result.contains("oops"));
    }

    #[tokio::test]
    async fn test_failing_command_still_returns_output() {
        let result = RunCommandTool
            .execute(json!({"command": "ls /definitely/not/a/path"}))
            .await
            .unwrap();
        assert!(!result.is_empty());
    }

    #[tokio::test]
    async fn test_output_capped() {
        let result = RunCommandTool
            .execute(json!({"command": "yes x | head -c 20000"}))
            .await
            .unwrap();
        assert!(result.contains("truncated to 5000 chars"));
    }
}

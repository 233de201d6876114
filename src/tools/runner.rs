//! Tool runner - registry and dispatch.
//!
//! Dispatch never fails: an unknown tool name or a handler error is
//! converted to a descriptive string the model can read and recover
//! from on its next iteration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::browser::{self, BrowserBridge};
use super::filesystem::{
    CopyFileTool, CreateDirectoryTool, DeleteFileTool, ListFilesTool, MoveFileTool, OpenFileTool,
    ReadFileTool, WriteFileTool,
};
use super::shell::RunCommandTool;
use super::spreadsheet;
use super::web::ReadWebpageTool;
use super::Tool;
use crate::config::Config;

/// Tool definition sent to the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool runner manages registered tools and dispatches calls to them
pub struct ToolRunner {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRunner {
    /// Create an empty tool runner
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a tool runner with the default tool set
    pub fn with_defaults(config: &Config, bridge: BrowserBridge) -> Self {
        let mut runner = Self::new();
        let out = config.output_dir.clone();

        // File tools
        runner.register(ReadFileTool::new(out.clone()));
        runner.register(WriteFileTool::new(out.clone()));
        runner.register(ListFilesTool::new(out.clone()));
        runner.register(OpenFileTool::new(out.clone()));
        runner.register(DeleteFileTool::new(out.clone()));
        runner.register(CopyFileTool::new(out.clone()));
        runner.register(MoveFileTool::new(out.clone()));
        runner.register(CreateDirectoryTool::new(out.clone()));

        // Browser tools (shared bridge singleton)
        browser::register_tools(&mut runner, bridge, out.clone());

        // Web fetch without a browser
        runner.register(ReadWebpageTool);

        // Spreadsheet tools
        spreadsheet::register_tools(&mut runner, out.clone());

        // Shell
        runner.register(RunCommandTool);

        runner
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Get tool definitions for the LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Dispatch a tool call, degrading every failure to a string.
    pub async fn dispatch(&self, name: &str, args: Value) -> String {
        let preview = format!("{}({})", name, preview_args(&args));
        crate::ui::print_tool_call(&preview);
        info!("[{}]", preview);

        let tool = match self.tools.get(name) {
            Some(tool) => tool,
            None => return format!("Unknown tool: {}", name),
        };

        match tool.execute(args).await {
            Ok(result) => {
                debug!("tool {} ok: {} chars", name, result.len());
                result
            }
            Err(e) => {
                debug!("tool {} failed: {}", name, e);
                format!("Error: {}", e)
            }
        }
    }

    /// Check if a tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Abbreviated argument preview for the call log.
fn preview_args(args: &Value) -> String {
    match args.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| {
                let mut repr = v.to_string();
                if repr.chars().count() > 50 {
                    repr = format!("{}…", repr.chars().take(50).collect::<String>());
                }
                format!("{}={}", k, repr)
            })
            .collect::<Vec<_>>()
            .join(", "),
        None => args.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::DummyTool;

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut runner = ToolRunner::new();
        runner.register(DummyTool {
            name: "test_tool".to_string(),
            result: "success".to_string(),
        });

        assert!(runner.has("test_tool"));
        let result = runner.dispatch("test_tool", serde_json::json!({})).await;
        assert_eq!(result, "success");
    }

    #[tokio::test]
    async fn test_unknown_tool_returns_string_not_error() {
        let runner = ToolRunner::new();
        let result = runner.dispatch("nope", serde_json::json!({})).await;
        assert_eq!(result, "Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_string() {
        struct FailingTool;

        #[async_trait::async_trait]
        impl Tool for FailingTool {
            fn name(&self) -> &str {
                "fail"
            }
            fn description(&self) -> &str {
                "always fails"
            }
            fn parameters(&self) -> Value {
                serde_json::json!({"type": "object"})
            }
            async fn execute(&self, _params: Value) -> crate::Result<String> {
                Err(crate::Error::Tool("it broke".to_string()))
            }
        }

        let mut runner = ToolRunner::new();
        runner.register(FailingTool);
        let result = runner.dispatch("fail", serde_json::json!({})).await;
        assert!(result.starts_with("Error:"));
        assert!(result.contains("it broke"));
    }

    #[test]
    fn test_preview_args_abbreviates_long_values() {
        let args = serde_json::json!({"content": "y".repeat(500), "path": "a.txt"});
        let preview = preview_args(&args);
        assert!(preview.len() < 200);
        assert!(preview.contains("path"));
    }
}

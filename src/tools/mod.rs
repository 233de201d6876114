//! Tools module - agent capabilities.
//!
//! Tools are the external actions the agent can take: file operations,
//! browser control, spreadsheet editing, web fetch, and shell commands.
//! Every tool returns a string on both success and failure; failure is
//! signaled by content, never by aborting the loop.

mod browser;
mod filesystem;
mod runner;
mod shell;
mod spreadsheet;
mod web;
mod workbook;

pub use browser::BrowserBridge;
pub use runner::{ToolDefinition, ToolRunner};
pub use workbook::{CellValue, Workbook};

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::Result;

/// Tool trait - interface for all agent capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in function calls
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Convert to tool definition for the LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Truncate text to a character cap, appending an explicit marker.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}\n[... truncated to {} chars]", cut, max_chars)
}

/// Resolve placeholder path tokens to the configured output directory.
///
/// The model frequently refers to "the desktop" without knowing the real
/// location; these substitutions keep file-producing tools landing in
/// the configured folder.
pub fn resolve_path(path: &str, output_dir: &Path) -> PathBuf {
    let trimmed = path.trim();
    let lower = trimmed.to_lowercase();

    for token in ["~/desktop", "desktop"] {
        if lower == *token {
            return output_dir.to_path_buf();
        }
        let prefix = format!("{}/", token);
        if lower.starts_with(&prefix) {
            return output_dir.join(&trimmed[prefix.len()..]);
        }
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(trimmed)
}

/// Dummy tool for testing
#[cfg(test)]
pub struct DummyTool {
    pub name: String,
    pub result: String,
}

#[cfg(test)]
#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Dummy tool for testing"
    }
    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_output_short_passthrough() {
        assert_eq!(truncate_output("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_output_appends_marker() {
        let out = truncate_output(&"x".repeat(100), 10);
        assert!(out.starts_with("xxxxxxxxxx\n"));
        assert!(out.contains("truncated to 10 chars"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let out = truncate_output(&"é".repeat(100), 10);
        assert!(out.contains("truncated"));
    }

    #[test]
    fn test_resolve_path_desktop_token() {
        let out = PathBuf::from("/home/u/Desktop");
        assert_eq!(resolve_path("desktop", &out), out);
        assert_eq!(resolve_path("~/Desktop/report.txt", &out), out.join("report.txt"));
        assert_eq!(resolve_path("Desktop/a/b.txt", &out), out.join("a/b.txt"));
    }

    #[test]
    fn test_resolve_path_plain_passthrough() {
        let out = PathBuf::from("/home/u/Desktop");
        assert_eq!(resolve_path("/tmp/file.txt", &out), PathBuf::from("/tmp/file.txt"));
        assert_eq!(resolve_path("notes.txt", &out), PathBuf::from("notes.txt"));
    }
}

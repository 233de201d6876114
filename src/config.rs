//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
use crate::Result;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Groq API key
    #[serde(default)]
    pub api_key: String,

    /// Fast model (cheap tier, high daily request limit)
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Smart model (expensive tier, low daily request limit)
    #[serde(default = "default_smart_model")]
    pub smart_model: String,

    /// Daily cap on smart-tier calls (safety buffer below provider limit)
    #[serde(default = "default_smart_daily_cap")]
    pub smart_daily_cap: u32,

    /// Maximum tool iterations per user message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Maximum completion attempts before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Maximum messages kept in conversation history
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Default destination for file-producing tools.
    /// Placeholder tokens like "~/Desktop" in tool paths resolve here.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Port for the browser bridge WebSocket server
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
}

fn default_fast_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_smart_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_smart_daily_cap() -> u32 {
    800
}

fn default_max_iterations() -> usize {
    25
}

fn default_max_retries() -> usize {
    3
}

fn default_max_history() -> usize {
    50
}

fn default_output_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_bridge_port() -> u16 {
    2345
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            fast_model: default_fast_model(),
            smart_model: default_smart_model(),
            smart_daily_cap: default_smart_daily_cap(),
            max_iterations: default_max_iterations(),
            max_retries: default_max_retries(),
            max_history: default_max_history(),
            output_dir: default_output_dir(),
            bridge_port: default_bridge_port(),
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".deskhand")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file, with env-var override for the API key
pub fn load() -> Result<Config> {
    let path = config_path();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)?
    } else {
        Config::default()
    };

    if let Ok(key) = std::env::var("GROQ_API_KEY") {
        if !key.is_empty() {
            config.api_key = key;
        }
    }

    if config.api_key.is_empty() {
        return Err(Error::Config(format!(
            "No API key. Run 'deskhand onboard' or set GROQ_API_KEY. (config: {:?})",
            path
        )));
    }

    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Interactive setup wizard
pub fn onboard() -> Result<()> {
    use crate::ui;
    use inquire::{Confirm, Text};

    println!("  Welcome! Let's get deskhand configured.\n");

    let mut config = Config::default();

    let key = Text::new("Enter your Groq API key:")
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
    config.api_key = key;

    ui::print_step(&format!("Default output folder is {:?}", config.output_dir));
    let keep_default = Confirm::new("Use this folder for generated files?")
        .with_default(true)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    if !keep_default {
        let new_path = Text::new("Enter output folder path:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
        config.output_dir = PathBuf::from(new_path);
    }

    std::fs::create_dir_all(&config.output_dir)?;
    save(&config)?;

    println!();
    ui::print_success("Setup complete!");
    ui::print_step("Start chatting with: deskhand chat");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fast_model, "llama-3.1-8b-instant");
        assert_eq!(config.smart_model, "llama-3.3-70b-versatile");
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.max_history, 50);
        assert_eq!(config.smart_daily_cap, 800);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.fast_model, config.fast_model);
        assert_eq!(parsed.max_retries, config.max_retries);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = serde_json::from_str(r#"{"api_key": "gsk_test"}"#).unwrap();
        assert_eq!(parsed.api_key, "gsk_test");
        assert_eq!(parsed.max_iterations, 25);
    }
}

//! Error types for deskhand

use thiserror::Error;

/// Result type alias for deskhand operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in deskhand
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Retries exhausted after {0} attempts")]
    ExhaustedRetries(usize),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Tool(format!("Workbook error: {}", err))
    }
}

//! deskhand - Autonomous desktop AI agent
//!
//! This library provides the orchestration core that turns free-text
//! requests into sequences of structured tool invocations (files,
//! browser, spreadsheets, web fetch, shell), driven by a two-tier
//! LLM completion strategy with retry and fallback.

pub mod agent;
pub mod config;
pub mod error;
pub mod session;
pub mod templates;
pub mod tools;
pub mod ui;

pub use error::{Error, Result};

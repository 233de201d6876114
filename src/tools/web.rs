//! Web tool - fetch page text over plain HTTP, no browser required.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{truncate_output, Tool};
use crate::error::Error;
use crate::Result;

/// Cap on extracted page text.
const FETCH_CAP: usize = 8_000;
const FETCH_TIMEOUT_SECS: u64 = 15;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fetch a URL and return its visible text
pub struct ReadWebpageTool;

#[async_trait]
impl Tool for ReadWebpageTool {
    fn name(&self) -> &str {
        "read_webpage"
    }
    fn description(&self) -> &str {
        "Quickly fetch text content from a URL via HTTP (no browser, max 8000 chars)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'url' parameter".to_string()))?;
        let url = normalize_url(url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Tool(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP error: {}", status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::Tool(format!("Failed to read response: {}", e)))?;

        let text = html_to_text(&html);
        if text.is_empty() {
            Ok("No content.".to_string())
        } else {
            Ok(truncate_output(&text, FETCH_CAP))
        }
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Elements whose content is boilerplate, not page text.
const SKIP_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "head", "noscript"];

/// Basic HTML to text conversion: drop boilerplate element content,
/// strip tags, collapse whitespace.
fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();

    for element in SKIP_ELEMENTS {
        let open = format!("<{}", element);
        let close = format!("</{}>", element);
        while let Some(start) = text.find(&open) {
            match text[start..].find(&close) {
                Some(offset) => {
                    let end = start + offset + close.len();
                    text.replace_range(start..end, " ");
                }
                None => break,
            }
        }
    }

    let mut result = String::with_capacity(text.len() / 4);
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

//! Browser tools - control a real browser through a WebSocket bridge.
//!
//! A local WebSocket server accepts a single connection from the
//! companion browser extension. Tool handlers send JSON commands with
//! correlation ids and await the matching reply within a timeout.
//!
//! Interactive-surface tools (`click`, `type`) resolve their target
//! through an ordered strategy chain: most human-like match first
//! (visible text, accessible role), raw CSS selector last. Each
//! strategy gets a short timeout; the first success wins and failure is
//! only reported once every strategy is exhausted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{resolve_path, truncate_output, Tool, ToolRunner};
use crate::error::Error;
use crate::Result;

/// Timeout for one resolution strategy.
const STRATEGY_TIMEOUT: Duration = Duration::from_secs(3);
/// Timeout for ordinary commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for navigation, which waits on page load.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Cap on page text results.
const PAGE_TEXT_CAP: usize = 6_000;
/// Cap on JavaScript evaluation results.
const EVAL_CAP: usize = 3_000;
/// Max links returned by `browser_get_links`.
const MAX_LINKS: usize = 40;

const NOT_CONNECTED: &str =
    "No browser connected. Install the deskhand browser extension and keep the browser open.";

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Bridge to the browser extension over WebSocket.
///
/// Singleton external session: created once at startup, shared by all
/// browser tools, torn down explicitly on session exit.
#[derive(Clone)]
pub struct BrowserBridge {
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
}

impl BrowserBridge {
    /// Create the bridge and start its WebSocket server in the
    /// background. Binding failures disable the browser tools instead
    /// of aborting startup.
    pub fn new(port: u16) -> Self {
        let bridge = Self {
            command_tx: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        bridge.start_server(port);
        bridge
    }

    fn start_server(&self, port: u16) {
        let command_tx = self.command_tx.clone();
        let pending = self.pending.clone();

        tokio::spawn(async move {
            let addr = format!("127.0.0.1:{}", port);
            let mut retries = 0;

            let listener = loop {
                match TcpListener::bind(&addr).await {
                    Ok(l) => {
                        info!("browser bridge listening on {}", addr);
                        break l;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && retries < 5 => {
                        retries += 1;
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                    Err(e) => {
                        warn!("browser bridge unavailable ({}): browser tools disabled", e);
                        return;
                    }
                }
            };

            while let Ok((stream, _)) = listener.accept().await {
                info!("browser extension connecting");
                let command_tx = command_tx.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, command_tx, pending).await {
                        debug!("browser connection ended: {}", e);
                    }
                });
            }
        });
    }

    pub fn is_connected(&self) -> bool {
        self.command_tx.lock().unwrap().is_some()
    }

    /// Send one command and await its correlated reply.
    pub async fn command(&self, mut payload: Value, timeout: Duration) -> Result<Value> {
        let sender = self
            .command_tx
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Tool(NOT_CONNECTED.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        payload["id"] = json!(id);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, reply_tx);

        let encoded = serde_json::to_string(&payload)?;
        debug!("bridge -> {}", encoded);
        if sender.send(encoded).is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(Error::Tool(NOT_CONNECTED.to_string()));
        }

        let reply = match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                self.pending.lock().unwrap().remove(&id);
                return Err(Error::Tool("Browser connection dropped mid-command".to_string()));
            }
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                return Err(Error::Tool(format!(
                    "Browser command timed out after {}s",
                    timeout.as_secs()
                )));
            }
        };

        if reply["ok"].as_bool().unwrap_or(false) {
            Ok(reply["data"].clone())
        } else {
            let msg = reply["error"].as_str().unwrap_or("browser command failed");
            Err(Error::Tool(msg.to_string()))
        }
    }

    /// Tear down the browser session. Best-effort: the extension is
    /// told to close its automation tab, then the channel is dropped.
    pub async fn shutdown(&self) {
        if let Some(sender) = self.command_tx.lock().unwrap().take() {
            let _ = sender.send(json!({"action": "close"}).to_string());
        }
        self.pending.lock().unwrap().clear();
    }
}

async fn handle_connection(
    stream: TcpStream,
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    pending: PendingMap,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| Error::Tool(format!("WebSocket handshake failed: {}", e)))?;
    info!("browser extension connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    {
        let mut guard = command_tx.lock().unwrap();
        *guard = Some(tx);
    }

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Ok(reply) = serde_json::from_str::<Value>(text.as_str()) {
                            if let Some(id) = reply["id"].as_u64() {
                                if let Some(waiter) = pending.lock().unwrap().remove(&id) {
                                    let _ = waiter.send(reply);
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("browser closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("websocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            cmd = rx.recv() => {
                match cmd {
                    Some(text) => {
                        ws_sender.send(WsMessage::Text(text.into())).await.ok();
                    }
                    None => break,
                }
            }
        }
    }

    let mut guard = command_tx.lock().unwrap();
    *guard = None;
    Ok(())
}

/// One named resolution strategy in a fallback chain.
struct Strategy {
    name: &'static str,
    command: Value,
}

/// Try strategies in order with a per-strategy timeout; first success
/// wins, aggregated failure on total exhaustion.
async fn run_strategies(
    bridge: &BrowserBridge,
    strategies: Vec<Strategy>,
    failure: String,
) -> Result<Value> {
    let mut tried = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        tried.push(strategy.name);
        match bridge.command(strategy.command, STRATEGY_TIMEOUT).await {
            Ok(data) => {
                debug!("strategy '{}' succeeded", strategy.name);
                return Ok(data);
            }
            // Not-connected fails the whole chain immediately.
            Err(Error::Tool(msg)) if msg == NOT_CONNECTED => {
                return Err(Error::Tool(msg));
            }
            Err(e) => debug!("strategy '{}' failed: {}", strategy.name, e),
        }
    }
    Err(Error::Tool(format!("{} (tried: {})", failure, tried.join(", "))))
}

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Tool(format!("Missing '{}' parameter", key)))
}

/// Open a URL
pub struct GotoTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for GotoTool {
    fn name(&self) -> &str {
        "browser_goto"
    }
    fn description(&self) -> &str {
        "Open a URL in the browser"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = require_str(&params, "url")?;
        let url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };

        let data = self
            .bridge
            .command(json!({"action": "goto", "url": url}), NAVIGATION_TIMEOUT)
            .await?;
        let title = data["title"].as_str().unwrap_or("");
        Ok(format!("Opened: {} | Title: {}", url, title))
    }
}

/// Click an element via the strategy chain
pub struct ClickTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &str {
        "browser_click"
    }
    fn description(&self) -> &str {
        "Click an element on the page - provide visible text or a CSS selector"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"selector": {"type": "string"}},
            "required": ["selector"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let selector = require_str(&params, "selector")?;
        let strategies = vec![
            Strategy {
                name: "visible text",
                command: json!({"action": "click", "strategy": "text", "target": selector}),
            },
            Strategy {
                name: "accessible role",
                command: json!({"action": "click", "strategy": "role", "target": selector}),
            },
            Strategy {
                name: "css selector",
                command: json!({"action": "click", "strategy": "css", "target": selector}),
            },
        ];

        run_strategies(
            &self.bridge,
            strategies,
            format!("Element not found: {}", selector),
        )
        .await?;
        Ok(format!("Clicked: {}", selector))
    }
}

/// Fill a form field via the strategy chain
pub struct TypeTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for TypeTool {
    fn name(&self) -> &str {
        "browser_type"
    }
    fn description(&self) -> &str {
        "Type text into a form field. Selector can be a placeholder, label, or CSS selector"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string"},
                "text": {"type": "string"}
            },
            "required": ["selector", "text"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let selector = require_str(&params, "selector")?;
        let text = require_str(&params, "text")?;
        let strategies = vec![
            Strategy {
                name: "placeholder",
                command: json!({"action": "type", "strategy": "placeholder", "target": selector, "text": text}),
            },
            Strategy {
                name: "label",
                command: json!({"action": "type", "strategy": "label", "target": selector, "text": text}),
            },
            Strategy {
                name: "textbox role",
                command: json!({"action": "type", "strategy": "textbox", "target": selector, "text": text}),
            },
            Strategy {
                name: "css selector",
                command: json!({"action": "type", "strategy": "css", "target": selector, "text": text}),
            },
        ];

        run_strategies(
            &self.bridge,
            strategies,
            format!("Input field not found: {}", selector),
        )
        .await?;
        Ok(format!("Typed '{}' into: {}", text, selector))
    }
}

/// Pick an option from a dropdown
pub struct SelectOptionTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for SelectOptionTool {
    fn name(&self) -> &str {
        "browser_select_option"
    }
    fn description(&self) -> &str {
        "Select an option in a dropdown by its visible label or value"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string"},
                "value": {"type": "string"}
            },
            "required": ["selector", "value"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let selector = require_str(&params, "selector")?;
        let value = require_str(&params, "value")?;
        let strategies = vec![
            Strategy {
                name: "option label",
                command: json!({"action": "select", "strategy": "label", "target": selector, "value": value}),
            },
            Strategy {
                name: "option value",
                command: json!({"action": "select", "strategy": "value", "target": selector, "value": value}),
            },
        ];

        run_strategies(
            &self.bridge,
            strategies,
            format!("Option '{}' not found in: {}", value, selector),
        )
        .await?;
        Ok(format!("Selected '{}' in: {}", value, selector))
    }
}

/// Pause between browser actions
pub struct WaitTool;

/// Ceiling on a requested pause.
const WAIT_CAP_SECS: f64 = 30.0;

#[async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "browser_wait"
    }
    fn description(&self) -> &str {
        "Wait the given number of seconds (max 30), e.g. for a page to settle"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"seconds": {"type": "number"}},
            "required": ["seconds"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let requested = match params.get("seconds") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| Error::Tool(format!("Invalid 'seconds' value: {}", s)))?,
            _ => return Err(Error::Tool("Missing 'seconds' parameter".to_string())),
        };
        let secs = requested.clamp(0.0, WAIT_CAP_SECS);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(format!("Waited {}s", secs))
    }
}

/// Read the visible text of the current page
pub struct GetTextTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for GetTextTool {
    fn name(&self) -> &str {
        "browser_get_text"
    }
    fn description(&self) -> &str {
        "Get all visible text from the current page (max 6000 chars)"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let data = self
            .bridge
            .command(json!({"action": "get_text"}), COMMAND_TIMEOUT)
            .await?;
        let text = data.as_str().unwrap_or("");
        Ok(truncate_output(text, PAGE_TEXT_CAP))
    }
}

/// Save a screenshot of the current page
pub struct ScreenshotTool {
    bridge: BrowserBridge,
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "browser_screenshot"
    }
    fn description(&self) -> &str {
        "Take a screenshot of the current page and save it as PNG"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let mut path = resolve_path(require_str(&params, "path")?, &self.output_dir);
        if path.extension().map(|e| e != "png").unwrap_or(true) {
            path = PathBuf::from(format!("{}.png", path.display()));
        }

        let data = self
            .bridge
            .command(json!({"action": "screenshot"}), COMMAND_TIMEOUT)
            .await?;
        let image = data["image"]
            .as_str()
            .ok_or_else(|| Error::Tool("Screenshot reply carried no image".to_string()))?;
        // The extension sends a data URL; strip the prefix before decoding.
        let b64 = image.rsplit(',').next().unwrap_or(image);
        let bytes = general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| Error::Tool(format!("Screenshot decode error: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Tool(format!("Screenshot error: {}", e)))?;
            }
        }
        std::fs::write(&path, bytes)
            .map_err(|e| Error::Tool(format!("Screenshot error: {}", e)))?;
        Ok(format!("Screenshot saved: {}", path.display()))
    }
}

/// List links on the current page
pub struct GetLinksTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for GetLinksTool {
    fn name(&self) -> &str {
        "browser_get_links"
    }
    fn description(&self) -> &str {
        "Return a list of links from the current page (max 40)"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let data = self
            .bridge
            .command(json!({"action": "get_links"}), COMMAND_TIMEOUT)
            .await?;
        Ok(format_links(&data))
    }
}

fn format_links(data: &Value) -> String {
    let links: Vec<String> = data
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|l| {
                    let text = l["text"].as_str().unwrap_or("").trim();
                    let href = l["href"].as_str().unwrap_or("");
                    if text.is_empty() || href.is_empty() {
                        None
                    } else {
                        let text: String = text.chars().take(60).collect();
                        Some(format!("{} -> {}", text, href))
                    }
                })
                .take(MAX_LINKS)
                .collect()
        })
        .unwrap_or_default();

    if links.is_empty() {
        "No links found.".to_string()
    } else {
        links.join("\n")
    }
}

/// Scroll the page
pub struct ScrollTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for ScrollTool {
    fn name(&self) -> &str {
        "browser_scroll"
    }
    fn description(&self) -> &str {
        "Scroll the page: up, down, top, or bottom"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "direction": {"type": "string", "enum": ["up", "down", "top", "bottom"]}
            },
            "required": ["direction"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let direction = params
            .get("direction")
            .and_then(|v| v.as_str())
            .unwrap_or("down");
        self.bridge
            .command(json!({"action": "scroll", "direction": direction}), COMMAND_TIMEOUT)
            .await?;
        Ok(format!("Scrolled: {}", direction))
    }
}

/// Press a keyboard key
pub struct PressKeyTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for PressKeyTool {
    fn name(&self) -> &str {
        "browser_press_key"
    }
    fn description(&self) -> &str {
        "Press a keyboard key: Enter, Tab, Escape, ArrowDown, etc."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"key": {"type": "string"}},
            "required": ["key"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let key = require_str(&params, "key")?;
        self.bridge
            .command(json!({"action": "press_key", "key": key}), COMMAND_TIMEOUT)
            .await?;
        Ok(format!("Pressed: {}", key))
    }
}

/// Report the current URL and title
pub struct CurrentUrlTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for CurrentUrlTool {
    fn name(&self) -> &str {
        "browser_current_url"
    }
    fn description(&self) -> &str {
        "Return the current URL and page title"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let data = self
            .bridge
            .command(json!({"action": "current_url"}), COMMAND_TIMEOUT)
            .await?;
        Ok(format!(
            "URL: {} | Title: {}",
            data["url"].as_str().unwrap_or(""),
            data["title"].as_str().unwrap_or("")
        ))
    }
}

/// Navigate back
pub struct GoBackTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for GoBackTool {
    fn name(&self) -> &str {
        "browser_go_back"
    }
    fn description(&self) -> &str {
        "Navigate back to the previous page"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let data = self
            .bridge
            .command(json!({"action": "go_back"}), NAVIGATION_TIMEOUT)
            .await?;
        Ok(format!("Went back. URL: {}", data["url"].as_str().unwrap_or("")))
    }
}

/// Evaluate JavaScript on the page
pub struct EvalJsTool {
    bridge: BrowserBridge,
}

#[async_trait]
impl Tool for EvalJsTool {
    fn name(&self) -> &str {
        "browser_eval_js"
    }
    fn description(&self) -> &str {
        "Execute JavaScript on the page and return the result"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"script": {"type": "string"}},
            "required": ["script"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let script = require_str(&params, "script")?;
        let data = self
            .bridge
            .command(json!({"action": "eval", "script": script}), COMMAND_TIMEOUT)
            .await?;

        if data.is_null() {
            Ok("OK (no result)".to_string())
        } else {
            let repr = match data.as_str() {
                Some(s) => s.to_string(),
                None => data.to_string(),
            };
            Ok(truncate_output(&repr, EVAL_CAP))
        }
    }
}

/// Register the full browser tool set against a shared bridge.
pub fn register_tools(runner: &mut ToolRunner, bridge: BrowserBridge, output_dir: PathBuf) {
    runner.register(GotoTool { bridge: bridge.clone() });
    runner.register(ClickTool { bridge: bridge.clone() });
    runner.register(TypeTool { bridge: bridge.clone() });
    runner.register(SelectOptionTool { bridge: bridge.clone() });
    runner.register(WaitTool);
    runner.register(GetTextTool { bridge: bridge.clone() });
    runner.register(ScreenshotTool { bridge: bridge.clone(), output_dir });
    runner.register(GetLinksTool { bridge: bridge.clone() });
    runner.register(ScrollTool { bridge: bridge.clone() });
    runner.register(PressKeyTool { bridge: bridge.clone() });
    runner.register(CurrentUrlTool { bridge: bridge.clone() });
    runner.register(GoBackTool { bridge: bridge.clone() });
    runner.register(EvalJsTool { bridge });
}

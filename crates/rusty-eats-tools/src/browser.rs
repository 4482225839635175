//! Browser tools for the agent.
//!
//! Elements are addressed by the index assigned in `browser_state`, so the
//! LLM is expected to call `browser_state` before clicking or typing.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use rusty_eats_browser::InteractiveElement;

use crate::{Tool, ToolContext, ToolOutput, ToolRegistry};

/// Name of the terminal tool that ends a run with a final answer.
pub const DONE_TOOL: &str = "done";

/// Upper bound on page text returned to the LLM, in characters.
const MAX_TEXT_CHARS: usize = 8_000;

const MAX_WAIT_SECS: u64 = 10;

pub fn register_browser_tools(registry: &mut ToolRegistry) {
    registry.register(Box::new(BrowserNavigateTool));
    registry.register(Box::new(BrowserStateTool));
    registry.register(Box::new(BrowserClickTool));
    registry.register(Box::new(BrowserTypeTool));
    registry.register(Box::new(BrowserExtractTextTool));
    registry.register(Box::new(BrowserWaitTool));
    registry.register(Box::new(DoneTool));
}

fn index_param(params: &serde_json::Value) -> Option<u32> {
    params
        .get("index")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n[... truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// Navigate to a URL and return page info.
pub struct BrowserNavigateTool;

#[async_trait]
impl Tool for BrowserNavigateTool {
    fn name(&self) -> &str {
        "browser_navigate"
    }

    fn description(&self) -> &str {
        "Navigate the browser to a URL and return the page title."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to navigate to"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");

        if url.is_empty() {
            return Ok(ToolOutput::error("Error: url parameter is required"));
        }

        match context.driver.navigate(url).await {
            Ok(info) => Ok(ToolOutput::ok(format!(
                "Navigated to: {}\nTitle: {}",
                info.url, info.title
            ))),
            Err(e) => Ok(ToolOutput::error(format!("Navigation failed: {e}"))),
        }
    }
}

/// List the interactive elements on the current page.
pub struct BrowserStateTool;

#[async_trait]
impl Tool for BrowserStateTool {
    fn name(&self) -> &str {
        "browser_state"
    }

    fn description(&self) -> &str {
        "Describe the current page: URL, title, and every visible interactive element with its index. Use the index with browser_click and browser_type."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let info = context.driver.page_info().await?;
        let elements = match context.driver.interactive_elements().await {
            Ok(elements) => elements,
            Err(e) => return Ok(ToolOutput::error(format!("Could not read page elements: {e}"))),
        };

        let mut out = format!("URL: {}\nTitle: {}\n", info.url, info.title);
        if elements.is_empty() {
            out.push_str("No interactive elements visible.");
        } else {
            out.push_str(&format!("Interactive elements ({}):\n", elements.len()));
            for element in &elements {
                out.push_str(&element.describe());
                out.push('\n');
            }
        }
        debug!(run_id = %context.run_id, elements = elements.len(), "browser_state");
        Ok(ToolOutput::ok(out))
    }
}

/// Click an element by index.
pub struct BrowserClickTool;

#[async_trait]
impl Tool for BrowserClickTool {
    fn name(&self) -> &str {
        "browser_click"
    }

    fn description(&self) -> &str {
        "Click the element with the given index from browser_state."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "integer",
                    "description": "Element index from browser_state"
                }
            },
            "required": ["index"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let Some(index) = index_param(&params) else {
            return Ok(ToolOutput::error("Error: index parameter is required"));
        };

        match context.driver.click(&InteractiveElement::selector(index)).await {
            Ok(()) => Ok(ToolOutput::ok(format!("Clicked element [{index}]"))),
            Err(e) => Ok(ToolOutput::error(format!(
                "Click failed: {e}. Call browser_state to refresh element indexes."
            ))),
        }
    }
}

/// Type text into an element by index.
pub struct BrowserTypeTool;

#[async_trait]
impl Tool for BrowserTypeTool {
    fn name(&self) -> &str {
        "browser_type"
    }

    fn description(&self) -> &str {
        "Type text into the input with the given index from browser_state, optionally pressing Enter afterwards."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "integer",
                    "description": "Element index from browser_state"
                },
                "text": {
                    "type": "string",
                    "description": "Text to type"
                },
                "press_enter": {
                    "type": "boolean",
                    "description": "Press Enter after typing (default: false)"
                }
            },
            "required": ["index", "text"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let Some(index) = index_param(&params) else {
            return Ok(ToolOutput::error("Error: index parameter is required"));
        };
        let Some(text) = params.get("text").and_then(|v| v.as_str()) else {
            return Ok(ToolOutput::error("Error: text parameter is required"));
        };
        let press_enter = params
            .get("press_enter")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let selector = InteractiveElement::selector(index);
        if let Err(e) = context.driver.type_text(&selector, text).await {
            return Ok(ToolOutput::error(format!("Typing failed: {e}")));
        }
        if press_enter {
            if let Err(e) = context.driver.press_enter(&selector).await {
                return Ok(ToolOutput::error(format!("Typed text but Enter failed: {e}")));
            }
        }

        let suffix = if press_enter { " and pressed Enter" } else { "" };
        Ok(ToolOutput::ok(format!("Typed \"{text}\" into [{index}]{suffix}")))
    }
}

/// Extract the visible text of the page.
pub struct BrowserExtractTextTool;

#[async_trait]
impl Tool for BrowserExtractTextTool {
    fn name(&self) -> &str {
        "browser_extract_text"
    }

    fn description(&self) -> &str {
        "Return the visible text content of the current page."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        match context.driver.page_text().await {
            Ok(text) => Ok(ToolOutput::ok(truncate_chars(&text, MAX_TEXT_CHARS))),
            Err(e) => Ok(ToolOutput::error(format!("Text extraction failed: {e}"))),
        }
    }
}

/// Pause to let the page settle.
pub struct BrowserWaitTool;

#[async_trait]
impl Tool for BrowserWaitTool {
    fn name(&self) -> &str {
        "browser_wait"
    }

    fn description(&self) -> &str {
        "Wait a number of seconds (max 10) for the page to update."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "seconds": {
                    "type": "integer",
                    "description": "Seconds to wait (default: 3)"
                }
            }
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let seconds = params
            .get("seconds")
            .and_then(|v| v.as_u64())
            .unwrap_or(3)
            .min(MAX_WAIT_SECS);
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        Ok(ToolOutput::ok(format!("Waited {seconds} seconds")))
    }
}

/// End the run with a final answer.
pub struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn name(&self) -> &str {
        DONE_TOOL
    }

    fn description(&self) -> &str {
        "Finish the task. Put everything the user asked for in `result`; it is returned verbatim."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "result": {
                    "type": "string",
                    "description": "The final answer for the user"
                }
            },
            "required": ["result"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let result = params
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(ToolOutput {
            content: result,
            is_error: false,
            finished: true,
        })
    }
}

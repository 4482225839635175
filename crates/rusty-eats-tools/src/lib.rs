//! Tools the browser agent can call.
//!
//! Tools are capabilities exposed to the LLM during agent runs.
//! Each tool implements the [`Tool`] trait and acts on the run's browser
//! through the [`ToolContext`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rusty_eats_browser::BrowserDriver;

pub mod browser;

pub use browser::DONE_TOOL;

/// Context provided to tools during execution.
pub struct ToolContext {
    /// Identifier of the agent run, for logging.
    pub run_id: String,
    pub driver: Arc<dyn BrowserDriver>,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
    /// Set by the terminal `done` tool; `content` then holds the final result.
    #[serde(default)]
    pub finished: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            finished: false,
        }
    }
}

/// The core tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the LLM (e.g., "browser_click").
    fn name(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput>;
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every browser tool plus `done`.
    pub fn with_browser_tools() -> Self {
        let mut registry = Self::new();
        browser::register_browser_tools(&mut registry);
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool definitions in the Anthropic Messages API shape.
    pub fn to_llm_tools(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Run `name`, turning unknown tools and tool failures into error outputs.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> ToolOutput {
        match self.get(name) {
            Some(tool) => match tool.execute(params, context).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(%e, tool = %name, run_id = %context.run_id, "Tool execution error");
                    ToolOutput::error(format!("Tool error: {e}"))
                }
            },
            None => ToolOutput::error(format!("Unknown tool: {name}")),
        }
    }
}

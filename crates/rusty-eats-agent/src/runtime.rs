//! Agent runtime loop: LLM completion + browser tool calling.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use rusty_eats_browser::{BrowserDriver, BrowserLauncher, CdpLauncher};
use rusty_eats_core::config::Config;
use rusty_eats_tools::{ToolContext, ToolRegistry};

use crate::prompt::{system_prompt, wrap_task};
use crate::provider::{
    AnthropicProvider, CompletionRequest, ContentBlock, LlmProvider, Message, Role,
};
use crate::{AgentRunner, AgentStep, StepObserver};

/// Limits and model parameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub model: String,
    pub max_steps: u32,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model(),
            max_steps: config.max_steps(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Production [`AgentRunner`]: one isolated browser per run, driven by an LLM.
pub struct BrowserAgent {
    launcher: Arc<dyn BrowserLauncher>,
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    settings: AgentSettings,
}

impl BrowserAgent {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        provider: Arc<dyn LlmProvider>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            launcher,
            provider,
            tools: ToolRegistry::with_browser_tools(),
            settings,
        }
    }

    /// Chrome over CDP driven by Anthropic, as configured.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(CdpLauncher::new(config.browser())),
            Arc::new(AnthropicProvider::from_config(config)),
            AgentSettings::from_config(config),
        )
    }

    async fn drive(
        &self,
        run_id: &str,
        driver: Arc<dyn BrowserDriver>,
        task: &str,
        observer: &dyn StepObserver,
    ) -> anyhow::Result<String> {
        let context = ToolContext {
            run_id: run_id.to_string(),
            driver,
        };
        let system = system_prompt();
        let tool_defs = self.tools.to_llm_tools();
        let mut messages = vec![Message::user_text(wrap_task(task))];

        for number in 1..=self.settings.max_steps {
            debug!(run_id, step = number, "Agent step");

            let request = CompletionRequest {
                model: self.settings.model.clone(),
                system: Some(system.clone()),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            };
            let response = self.provider.complete(&request).await?;
            let text = response.text();
            let tool_uses = response.tool_uses();

            messages.push(Message {
                role: Role::Assistant,
                content: response.content.clone(),
            });

            // No tool calls: the model answered in plain text.
            if tool_uses.is_empty() {
                let answer = text.trim();
                if answer.is_empty() {
                    anyhow::bail!("Agent returned an empty response at step {number}");
                }
                observer
                    .on_step(&step(number, false, "Answered without tools"))
                    .await;
                observer.on_step(&step(number, true, "Task finished")).await;
                return Ok(answer.to_string());
            }

            let mut results = Vec::with_capacity(tool_uses.len());
            let mut finished: Option<String> = None;
            let mut called = Vec::with_capacity(tool_uses.len());

            for (id, name, input) in tool_uses {
                let output = self.tools.execute(&name, input, &context).await;
                debug!(run_id, tool = %name, is_error = output.is_error, "Tool executed");
                if output.finished && finished.is_none() {
                    finished = Some(output.content.clone());
                }
                called.push(name);
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: output.content,
                    is_error: output.is_error,
                });
            }

            messages.push(Message {
                role: Role::User,
                content: results,
            });

            observer
                .on_step(&step(number, false, &called.join(", ")))
                .await;

            if let Some(result) = finished {
                observer.on_step(&step(number, true, "Task finished")).await;
                return Ok(result);
            }
        }

        anyhow::bail!(
            "Agent stopped after {} steps without finishing the task",
            self.settings.max_steps
        )
    }
}

fn step(number: u32, is_done: bool, summary: &str) -> AgentStep {
    AgentStep {
        number,
        is_done,
        summary: summary.to_string(),
    }
}

#[async_trait]
impl AgentRunner for BrowserAgent {
    async fn run(&self, task: &str, observer: &dyn StepObserver) -> anyhow::Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        info!(%run_id, provider = self.provider.id(), model = %self.settings.model, "Agent run started");

        let driver = self.launcher.launch().await?;
        let outcome = self.drive(&run_id, driver.clone(), task, observer).await;

        // The session is closed whatever the outcome.
        if let Err(e) = driver.close().await {
            warn!(%run_id, %e, "Failed to close browser session");
        }

        match &outcome {
            Ok(_) => info!(%run_id, elapsed_ms = start.elapsed().as_millis() as u64, "Agent run finished"),
            Err(e) => warn!(%run_id, %e, elapsed_ms = start.elapsed().as_millis() as u64, "Agent run failed"),
        }
        outcome
    }
}

//! Agent runner: turns a natural-language task into browser actions.
//!
//! The gateway only sees the [`AgentRunner`] trait: hand it a task and a
//! [`StepObserver`], get back the final text or an error. [`BrowserAgent`]
//! is the production runner; it launches a browser, lets an LLM drive it
//! through the browser tools, and reports every step to the observer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod prompt;
pub mod provider;
pub mod runtime;
pub mod tasks;

pub use runtime::{AgentSettings, BrowserAgent};
pub use tasks::{Intent, TaskSettings, build_order_task, build_search_task};

/// Progress notification emitted by a runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStep {
    /// 1-based step number within the run.
    pub number: u32,
    /// True for the single completion notification at the end of a run.
    pub is_done: bool,
    /// Short description of what the step did.
    pub summary: String,
}

/// Receives step notifications while a runner works.
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn on_step(&self, step: &AgentStep);
}

/// Executes a natural-language browser task end to end.
///
/// `observer` is called at least once per internal step and once more when
/// the run completes. The call either returns the final result text or fails.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, task: &str, observer: &dyn StepObserver) -> anyhow::Result<String>;
}

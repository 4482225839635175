//! Background task launcher.
//!
//! [`TaskLauncher::launch`] seeds a pending entry and spawns the agent run
//! without awaiting anything, so tool calls acknowledge immediately. The
//! spawned unit always leaves a terminal entry behind: completed, failed
//! (including panics), or cancelled. Handles are kept in a registry so runs
//! can be listed, cancelled, and drained on shutdown.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rusty_eats_agent::{AgentRunner, AgentStep, Intent, StepObserver, TaskSettings};
use rusty_eats_core::results::{ResultEntry, ResultStore};

use crate::reporter::Reporter;

/// How long `shutdown` waits for cancelled runs to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct TrackedTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
    intent: Intent,
    started_at: DateTime<Utc>,
}

/// A run that has not finished yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub request_id: String,
    pub kind: &'static str,
    pub started_at: DateTime<Utc>,
}

/// Everything a spawned run needs, shared with the launcher.
struct Shared {
    store: Arc<ResultStore>,
    runner: Arc<dyn AgentRunner>,
    settings: TaskSettings,
    permits: Semaphore,
}

pub struct TaskLauncher {
    shared: Arc<Shared>,
    tasks: Mutex<HashMap<String, TrackedTask>>,
    shutdown: CancellationToken,
}

impl TaskLauncher {
    pub fn new(
        store: Arc<ResultStore>,
        runner: Arc<dyn AgentRunner>,
        settings: TaskSettings,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                runner,
                settings,
                permits: Semaphore::new(max_concurrent_runs.max(1)),
            }),
            tasks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.shared.store
    }

    /// Seed the pending entry for `request_id` and start the run.
    ///
    /// Returns false without starting anything when `request_id` already has
    /// an entry; each id is written by exactly one run. Otherwise returns as
    /// soon as the run is spawned. Must be called from within a Tokio runtime.
    pub fn launch(&self, request_id: &str, intent: Intent, reporter: Arc<dyn Reporter>) -> bool {
        let seeded = self
            .shared
            .store
            .insert_new(request_id, ResultEntry::Pending(intent.pending_text()));
        if !seeded {
            warn!(request_id, "Request id already used, run not started");
            return false;
        }

        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(run_task(
            self.shared.clone(),
            request_id.to_string(),
            intent.clone(),
            reporter,
            cancel.clone(),
        ));

        info!(request_id, kind = intent.kind(), "Task launched");

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, t| !t.handle.is_finished());
        tasks.insert(
            request_id.to_string(),
            TrackedTask {
                handle,
                cancel,
                intent,
                started_at: Utc::now(),
            },
        );
        true
    }

    /// Cancel the run for `request_id`. Returns false if it is unknown or
    /// already finished.
    pub fn cancel(&self, request_id: &str) -> bool {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match tasks.get(request_id) {
            Some(task) if !task.handle.is_finished() => {
                task.cancel.cancel();
                info!(request_id, "Task cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Runs that have not finished, oldest first.
    pub fn active(&self) -> Vec<ActiveTask> {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut active: Vec<ActiveTask> = tasks
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(id, t)| ActiveTask {
                request_id: id.clone(),
                kind: t.intent.kind(),
                started_at: t.started_at,
            })
            .collect();
        active.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        active
    }

    /// Cancel every run and wait (bounded) for them to record their final state.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.drain().map(|(_, t)| t.handle).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Waiting for background tasks to stop");
        if tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("Background tasks did not stop within the shutdown grace period");
        }
    }
}

/// Counts steps and forwards them to the reporter.
struct ReportingObserver<'a> {
    intent: &'a Intent,
    reporter: &'a dyn Reporter,
    steps: AtomicU64,
}

#[async_trait]
impl<'a> StepObserver for ReportingObserver<'a> {
    async fn on_step(&self, step: &AgentStep) {
        let count = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(count, agent_step = step.number, done = step.is_done, summary = %step.summary, "Agent step");
        self.reporter.info(&self.intent.step_message(count)).await;
        self.reporter.report_progress(count).await;
    }
}

async fn run_task(
    shared: Arc<Shared>,
    request_id: String,
    intent: Intent,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
) {
    let observer = ReportingObserver {
        intent: &intent,
        reporter: reporter.as_ref(),
        steps: AtomicU64::new(0),
    };

    let outcome = tokio::select! {
        _ = cancel.cancelled() => None,
        result = AssertUnwindSafe(execute(&shared, &intent, &observer)).catch_unwind() => Some(result),
    };

    match outcome {
        None => {
            shared.store.put(&request_id, ResultEntry::Cancelled);
            info!(%request_id, "Task cancelled");
        }
        Some(Ok(Ok(result))) => {
            shared.store.put(&request_id, ResultEntry::Completed(result));
            info!(%request_id, kind = intent.kind(), "Task completed");
            if let Some(notice) = intent.success_notice() {
                reporter.info(&notice).await;
            }
        }
        Some(Ok(Err(e))) => {
            let message = format!("{e:#}");
            error!(%request_id, kind = intent.kind(), error = %message, "Task failed");
            shared
                .store
                .put(&request_id, ResultEntry::Failed(message.clone()));
            reporter.error(&intent.failure_notice(&message)).await;
        }
        Some(Err(panic)) => {
            let message = format!("Agent run panicked: {}", panic_message(panic.as_ref()));
            error!(%request_id, kind = intent.kind(), error = %message, "Task failed");
            shared
                .store
                .put(&request_id, ResultEntry::Failed(message.clone()));
            reporter.error(&intent.failure_notice(&message)).await;
        }
    }
}

/// Wait for a run slot, then hand the formatted task to the runner.
async fn execute(
    shared: &Shared,
    intent: &Intent,
    observer: &ReportingObserver<'_>,
) -> anyhow::Result<String> {
    let _permit = shared
        .permits
        .acquire()
        .await
        .map_err(|_| anyhow::anyhow!("Task launcher is closed"))?;
    let task = intent.task_text(&shared.settings);
    shared.runner.run(&task, observer).await
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

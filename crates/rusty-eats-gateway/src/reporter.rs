//! Per-request reporting context.
//!
//! Background tasks report through a [`Reporter`] bound to the connection
//! and request that started them. Every call is fire-and-forget: a closed
//! connection drops the message and the task carries on. Log messages below
//! the level the client set with `logging/setLevel` are not sent.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use rusty_eats_core::protocol::{JsonRpcNotification, LogLevel};

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Report the current step counter.
    async fn report_progress(&self, step: u64);

    /// Informational message to the client.
    async fn info(&self, message: &str);

    /// Error message to the client.
    async fn error(&self, message: &str);
}

/// Sends MCP notifications on a connection's outbound channel.
pub struct McpReporter {
    outbound: mpsc::UnboundedSender<String>,
    progress_token: Option<serde_json::Value>,
    logger: String,
    min_level: Arc<RwLock<LogLevel>>,
}

impl McpReporter {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        progress_token: Option<serde_json::Value>,
        logger: impl Into<String>,
    ) -> Self {
        Self {
            outbound,
            progress_token,
            logger: logger.into(),
            min_level: Arc::new(RwLock::new(LogLevel::default())),
        }
    }

    /// Follow a level that the client may change while the task runs.
    pub fn with_min_level(mut self, min_level: Arc<RwLock<LogLevel>>) -> Self {
        self.min_level = min_level;
        self
    }

    fn log(&self, level: LogLevel, message: &str) {
        let min = *self.min_level.read().unwrap_or_else(PoisonError::into_inner);
        if level < min {
            debug!(?level, ?min, "Log notification below client level");
            return;
        }
        self.send(&JsonRpcNotification::log(level, &self.logger, message));
    }

    fn send(&self, frame: &impl Serialize) {
        match serde_json::to_string(frame) {
            Ok(msg) => {
                if self.outbound.send(msg).is_err() {
                    debug!("Connection closed, dropping notification");
                }
            }
            Err(e) => tracing::error!(%e, "Failed to serialize notification"),
        }
    }
}

#[async_trait]
impl Reporter for McpReporter {
    async fn report_progress(&self, step: u64) {
        // Progress is only meaningful to a client that asked for it.
        if let Some(token) = &self.progress_token {
            self.send(&JsonRpcNotification::progress(token, step));
        }
    }

    async fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    async fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::from_str(&msg).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_notifications_with_progress_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = McpReporter::new(tx, Some(json!("tok-1")), "uber_eats");

        reporter.info("Step 1 completed").await;
        reporter.report_progress(1).await;
        reporter.error("boom").await;

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["method"], "notifications/message");
        assert_eq!(frames[0]["params"]["level"], "info");
        assert_eq!(frames[0]["params"]["logger"], "uber_eats");
        assert_eq!(frames[0]["params"]["data"], "Step 1 completed");
        assert_eq!(frames[1]["method"], "notifications/progress");
        assert_eq!(frames[1]["params"]["progressToken"], "tok-1");
        assert_eq!(frames[1]["params"]["progress"], 1);
        assert_eq!(frames[2]["params"]["level"], "error");
    }

    #[tokio::test]
    async fn test_progress_skipped_without_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = McpReporter::new(tx, None, "uber_eats");
        reporter.report_progress(3).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_messages_below_min_level_are_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let level = Arc::new(RwLock::new(LogLevel::Warning));
        let reporter = McpReporter::new(tx, Some(json!(1)), "uber_eats").with_min_level(level.clone());

        reporter.info("Step 1 completed").await;
        reporter.report_progress(1).await;
        reporter.error("boom").await;
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["method"], "notifications/progress");
        assert_eq!(frames[1]["params"]["level"], "error");

        // Lowered mid-run: the next info goes out.
        *level.write().unwrap() = LogLevel::Info;
        reporter.info("Step 2 completed").await;
        assert_eq!(drain(&mut rx)[0]["params"]["data"], "Step 2 completed");
    }

    #[tokio::test]
    async fn test_closed_connection_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let reporter = McpReporter::new(tx, Some(json!(1)), "uber_eats");
        reporter.info("nobody listening").await;
        reporter.report_progress(1).await;
    }
}

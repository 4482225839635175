//! Per-connection MCP session.
//!
//! JSON-RPC ids are only unique within one client connection, while the
//! result store and the launcher are shared by the whole process. A session
//! scopes every id its client sends so runs from different connections never
//! share a key, and it carries the connection's outbound channel and the log
//! level the client picked with `logging/setLevel`.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use rusty_eats_core::protocol::{LogLevel, request_key};

#[derive(Clone)]
pub struct Session {
    id: String,
    outbound: mpsc::UnboundedSender<String>,
    log_level: Arc<RwLock<LogLevel>>,
}

impl Session {
    pub fn new(id: impl Into<String>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: id.into(),
            outbound,
            log_level: Arc::new(RwLock::new(LogLevel::default())),
        }
    }

    /// Session with a fresh random id.
    pub fn open(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self::new(Uuid::new_v4().simple().to_string(), outbound)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn outbound(&self) -> &mpsc::UnboundedSender<String> {
        &self.outbound
    }

    /// Result-store key for a JSON-RPC id sent on this connection.
    pub fn request_key(&self, rpc_id: &Value) -> Option<String> {
        request_key(rpc_id).map(|key| format!("{}:{key}", self.id))
    }

    pub fn set_log_level(&self, level: LogLevel) {
        *self.log_level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    /// Handle on the minimum level, shared with the reporters of this session.
    pub fn log_level(&self) -> Arc<RwLock<LogLevel>> {
        self.log_level.clone()
    }
}

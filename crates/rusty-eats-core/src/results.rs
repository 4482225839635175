//! In-memory result store keyed by request identifier.
//!
//! Each tool invocation seeds a [`ResultEntry::Pending`] placeholder for its
//! request id; the background task that serves the request later replaces it
//! with a terminal entry. Readers poll with [`ResultStore::get`].
//!
//! Entries are never evicted. The store lives from server startup to shutdown.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Text rendered for a request that was cancelled before it resolved.
pub const CANCELLED_TEXT: &str = "Request was cancelled before completion";

/// Current state of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ResultEntry {
    /// Still running; holds a human-readable progress note.
    Pending(String),
    /// Finished; holds the agent's final answer.
    Completed(String),
    /// Failed; holds the error description.
    Failed(String),
    /// Stopped before resolving (shutdown or explicit cancel).
    Cancelled,
}

impl ResultEntry {
    /// Text returned to MCP clients reading the result resource.
    pub fn text(&self) -> String {
        match self {
            Self::Pending(note) => note.clone(),
            Self::Completed(result) => result.clone(),
            Self::Failed(error) => format!("Error: {error}"),
            Self::Cancelled => CANCELLED_TEXT.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Process-wide request result map.
///
/// `put` and `get` hold the lock only for the map operation itself and never
/// await, so a reader always sees either the old or the new entry in full.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: RwLock<HashMap<String, ResultEntry>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `id`. Last write wins.
    pub fn put(&self, id: &str, entry: ResultEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(id.to_string(), entry);
    }

    /// Insert `entry` only if `id` has never been seen. Returns false, leaving
    /// the existing entry alone, when the id is already taken.
    pub fn insert_new(&self, id: &str, entry: ResultEntry) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(id) {
            return false;
        }
        entries.insert(id.to_string(), entry);
        true
    }

    /// Current entry for `id`, or `None` if it was never seeded.
    pub fn get(&self, id: &str) -> Option<ResultEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, status)` pairs sorted by id.
    pub fn snapshot(&self) -> Vec<(String, &'static str)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.status()))
            .collect();
        out.sort();
        out
    }

    /// Number of entries still pending.
    pub fn pending_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| !e.is_terminal())
            .count()
    }
}

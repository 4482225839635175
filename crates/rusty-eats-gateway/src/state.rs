//! Gateway shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusty_eats_agent::{AgentRunner, TaskSettings};
use rusty_eats_core::config::Config;
use rusty_eats_core::results::ResultStore;

use crate::launcher::TaskLauncher;

/// State shared by every connection and background task.
///
/// Created once at startup and dropped at shutdown; the result store it owns
/// has the same lifetime.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub store: Arc<ResultStore>,
    pub launcher: TaskLauncher,
    connections: AtomicUsize,
}

impl GatewayState {
    pub fn new(config: Config, runner: Arc<dyn AgentRunner>) -> Self {
        let store = Arc::new(ResultStore::new());
        let launcher = TaskLauncher::new(
            store.clone(),
            runner,
            TaskSettings::from_config(&config),
            config.max_concurrent_runs(),
        );
        Self {
            config: Arc::new(config),
            store,
            launcher,
            connections: AtomicUsize::new(0),
        }
    }

    /// Name used as the MCP server name and as the logger of log notifications.
    pub fn server_name(&self) -> String {
        self.config.server_name()
    }

    pub fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn connection_closed(&self) -> usize {
        self.connections.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

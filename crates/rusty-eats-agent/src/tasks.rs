//! Task formatting for the two food intents.
//!
//! The produced text is the only thing the agent knows about the task, so each
//! template spells out ordered steps, how to recognise the elements involved,
//! and when the task is finished. Inputs are substituted verbatim.

use serde::{Deserialize, Serialize};

use rusty_eats_core::config::Config;

/// Values the templates need that come from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSettings {
    /// Landing page the search starts from.
    pub search_url: String,
}

impl TaskSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_url: config.search_url(),
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Instructions for finding menu items matching `search_term`.
pub fn build_search_task(search_url: &str, search_term: &str) -> String {
    format!(
        r#"
0. Start by going to: {search_url}
1. Type "{search_term}" in the global search bar and press enter
2. Go to the first search result (this is the most popular restaurant).
3. When you can see the menu options for the restaurant, use the restaurant's own search input located under the banner (identify it by the placeholder "Search in [restaurant name]")
4. Click the input field and type "{search_term}", then press enter
5. Check for menu options related to "{search_term}"
6. Get the name, url and price of the top 3 items related to "{search_term}". URL is very important. When you have all three, you are done.
"#
    )
}

/// Instructions for ordering the item at `item_url`.
pub fn build_order_task(item_url: &str) -> String {
    format!(
        r#"
1. Go to {item_url}
2. Click "Add to order"
3. Wait 3 seconds
4. Click "Go to checkout"
5. If there are upsell modals, click "Skip"
6. Click "Place order". Once the order is placed, you are done.
"#
    )
}

/// What a tool invocation asked the agent to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Search { search_term: String },
    Order { item_url: String, item_name: String },
}

impl Intent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Order { .. } => "order",
        }
    }

    /// Full task text handed to the agent runner.
    pub fn task_text(&self, settings: &TaskSettings) -> String {
        match self {
            Self::Search { search_term } => build_search_task(&settings.search_url, search_term),
            Self::Order { item_url, .. } => build_order_task(item_url),
        }
    }

    /// Placeholder stored while the request runs.
    pub fn pending_text(&self) -> String {
        match self {
            Self::Search { search_term } => {
                format!("Search for '{search_term}' in progress. Check back in 30 seconds")
            }
            Self::Order { item_name, .. } => {
                format!("Order for '{item_name}' in progress. Check back in 30 seconds")
            }
        }
    }

    /// Informational message for the `step`-th progress notification.
    pub fn step_message(&self, step: u64) -> String {
        match self {
            Self::Search { .. } => format!("Step {step} completed"),
            Self::Order { .. } => format!("Order step {step} completed"),
        }
    }

    /// Error notification sent when the run fails.
    pub fn failure_notice(&self, error: &str) -> String {
        match self {
            Self::Search { search_term } => {
                format!("Error searching for '{search_term}': {error}")
            }
            Self::Order { item_name, .. } => format!("Error ordering '{item_name}': {error}"),
        }
    }

    /// Informational message sent when the run succeeds, if the intent has one.
    pub fn success_notice(&self) -> Option<String> {
        match self {
            Self::Search { .. } => None,
            Self::Order { item_name, .. } => {
                Some(format!("Order for '{item_name}' has been placed successfully!"))
            }
        }
    }
}

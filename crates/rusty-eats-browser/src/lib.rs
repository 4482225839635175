//! Browser automation for agent runs.
//!
//! [`BrowserDriver`] is the seam between the agent tools and a real browser.
//! The CDP backend needs the `browser` feature flag and Chrome/Chromium
//! installed; without it [`CdpLauncher::launch`] fails with a descriptive
//! error so the run resolves as failed instead of hanging.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rusty_eats_core::config::BrowserConfig;

#[cfg(feature = "browser")]
mod cdp;
pub mod dom;

pub use dom::InteractiveElement;

/// Title and URL of the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub title: String,
    pub url: String,
}

/// One live browser page driven by an agent run.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` and wait for the load to settle.
    async fn navigate(&self, url: &str) -> anyhow::Result<PageInfo>;

    /// Title and URL of the current page.
    async fn page_info(&self) -> anyhow::Result<PageInfo>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> anyhow::Result<()>;

    /// Focus the element matching `selector` and type `text` into it.
    async fn type_text(&self, selector: &str, text: &str) -> anyhow::Result<()>;

    /// Press Enter on the element matching `selector`.
    async fn press_enter(&self, selector: &str) -> anyhow::Result<()>;

    /// Shut the browser down. Further calls fail.
    async fn close(&self) -> anyhow::Result<()>;

    /// Visible text of the whole page.
    async fn page_text(&self) -> anyhow::Result<String> {
        let value = self.evaluate("document.body ? document.body.innerText : ''").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Tag every visible interactive element with an index and list them.
    async fn interactive_elements(&self) -> anyhow::Result<Vec<InteractiveElement>> {
        let value = self.evaluate(dom::INDEX_ELEMENTS_SCRIPT).await?;
        dom::parse_elements(value)
    }
}

/// Starts a fresh browser for each agent run.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Arc<dyn BrowserDriver>>;
}

/// Launches Chrome/Chromium over the DevTools protocol.
pub struct CdpLauncher {
    config: BrowserConfig,
}

impl CdpLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
    #[cfg(feature = "browser")]
    async fn launch(&self) -> anyhow::Result<Arc<dyn BrowserDriver>> {
        let driver = cdp::CdpDriver::launch(&self.config).await?;
        Ok(Arc::new(driver))
    }

    #[cfg(not(feature = "browser"))]
    async fn launch(&self) -> anyhow::Result<Arc<dyn BrowserDriver>> {
        anyhow::bail!(
            "Browser support is not compiled in; rebuild with the `browser` feature and install Chrome/Chromium"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_launch_without_feature_fails() {
        let launcher = CdpLauncher::new(BrowserConfig::default());
        let err = launcher.launch().await.err().expect("launch should fail");
        assert!(err.to_string().contains("`browser` feature"));
    }

    #[test]
    fn test_launcher_keeps_config() {
        let launcher = CdpLauncher::new(BrowserConfig {
            headless: true,
            ..BrowserConfig::default()
        });
        assert!(launcher.config().headless);
        assert_eq!(launcher.config().timeout_ms, 30_000);
    }
}

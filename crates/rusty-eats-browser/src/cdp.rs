//! Chrome DevTools Protocol driver (chromiumoxide).

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rusty_eats_core::config::BrowserConfig;

use crate::{BrowserDriver, PageInfo};

/// A single browser process with one page.
pub struct CdpDriver {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl CdpDriver {
    pub async fn launch(config: &BrowserConfig) -> anyhow::Result<Self> {
        let mut builder = chromiumoxide::BrowserConfig::builder()
            .request_timeout(Duration::from_millis(config.timeout_ms));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(|e| anyhow::anyhow!(e))?;

        let (browser, mut handler) = Browser::launch(cdp_config).await?;

        // The handler stream must be polled for the connection to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(%e, "CDP handler event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(headless = config.headless, "Browser launched");

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> anyhow::Result<PageInfo> {
        debug!(url, "Browser navigate");
        self.page.goto(url).await?;
        self.page_info().await
    }

    async fn page_info(&self) -> anyhow::Result<PageInfo> {
        Ok(PageInfo {
            title: self.page.get_title().await?.unwrap_or_default(),
            url: self.page.url().await?.unwrap_or_default(),
        })
    }

    async fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value> {
        let result = self.page.evaluate(expression).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click(&self, selector: &str) -> anyhow::Result<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> anyhow::Result<()> {
        self.page
            .find_element(selector)
            .await?
            .click()
            .await?
            .type_str(text)
            .await?;
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> anyhow::Result<()> {
        self.page
            .find_element(selector)
            .await?
            .press_key("Enter")
            .await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(%e, "Browser close failed");
        }
        let _ = browser.wait().await;
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

//! Live `PageDriver` backed by a Chrome DevTools session.

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::PageDriver;
use crate::error::DriverError;

const SELECTOR_POLL: Duration = Duration::from_millis(200);

const IS_VISIBLE_JS: &str = "function() {
    const s = window.getComputedStyle(this);
    return s.display !== 'none' && s.visibility !== 'hidden' && this.getClientRects().length > 0;
}";

fn protocol(err: CdpError) -> DriverError {
    let msg = err.to_string();
    if msg.contains("No node") || msg.contains("detached") || msg.contains("Could not find node") {
        DriverError::Detached(msg)
    } else {
        DriverError::Protocol(msg)
    }
}

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    pub async fn launch(headless: bool) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Launch)?;
        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event stream error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "browser process did not exit cleanly");
        }
        self.handler.abort();
    }
}

impl PageDriver for ChromeDriver {
    type Element = Element;

    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn query_selector(&mut self, selector: &str) -> Result<Option<Element>, DriverError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&mut self, selector: &str) -> Result<Vec<Element>, DriverError> {
        self.page.find_elements(selector).await.map_err(protocol)
    }

    async fn query_within(&mut self, parent: &Element, selector: &str) -> Result<Option<Element>, DriverError> {
        let found = parent.find_elements(selector).await.map_err(protocol)?;
        Ok(found.into_iter().next())
    }

    async fn is_visible(&mut self, element: &Element) -> Result<bool, DriverError> {
        let ret = element
            .call_js_fn(IS_VISIBLE_JS, false)
            .await
            .map_err(protocol)?;
        Ok(ret
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn inner_text(&mut self, element: &Element) -> Result<String, DriverError> {
        Ok(element
            .inner_text()
            .await
            .map_err(protocol)?
            .unwrap_or_default())
    }

    async fn click(&mut self, element: &Element) -> Result<(), DriverError> {
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let started = Instant::now();
        loop {
            if !self.query_selector_all(selector).await?.is_empty() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(DriverError::Timeout {
                    selector: selector.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn wait_for_timeout(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page.content().await.map_err(protocol)
    }
}

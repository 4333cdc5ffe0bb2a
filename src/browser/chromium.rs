//! Chromium-backed browser using chromiumoxide.

use super::{Browser, BrowserPage, Selector, SelectorKind, WaitState};
use crate::config::BrowserConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How often `wait_for_selector` re-queries the DOM
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quiet period required before the network counts as idle
const NETWORK_IDLE_MS: u64 = 500;

/// Returns true when the element has a rendered, non-hidden box
const VISIBILITY_CHECK: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden'
        && style.display !== 'none';
}"#;

/// Chromium instance shared by every job of a run.
pub struct ChromiumBrowser {
    browser: Arc<Mutex<chromiumoxide::Browser>>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch Chromium according to the browser configuration.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = chromiumoxide::BrowserConfig::builder()
            .launch_timeout(Duration::from_millis(config.launch_timeout_ms))
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run");

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = chromiumoxide::Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {}", e);
                }
            }
        });

        tracing::info!("Chromium browser launched (headless: {})", config.headless);

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
        })
    }

    /// Close the browser process.
    pub async fn shutdown(self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close Chromium")?;
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    type Page = ChromiumPage;

    async fn new_page(&self) -> Result<ChromiumPage> {
        let browser = self.browser.lock().await;

        let context_id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .context("failed to create browser context")?;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow!("failed to build target params: {e}"))?;

        let page = match browser.new_page(params).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(dispose) = browser.dispose_browser_context(context_id).await {
                    tracing::debug!("Failed to dispose browser context: {}", dispose);
                }
                return Err(e).context("failed to create new page");
            }
        };

        Ok(ChromiumPage {
            page,
            context_id,
            browser: Arc::clone(&self.browser),
        })
    }
}

/// A single Chromium page in its own browser context.
pub struct ChromiumPage {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Mutex<chromiumoxide::Browser>>,
}

impl ChromiumPage {
    async fn find_first(&self, selector: &Selector) -> Option<Element> {
        let found = match selector.kind {
            SelectorKind::XPath => self.page.find_xpath(selector.query.as_str()).await,
            SelectorKind::Css => self.page.find_element(selector.query.as_str()).await,
        };
        found.ok()
    }

    async fn is_visible(element: &Element) -> bool {
        match element.call_js_fn(VISIBILITY_CHECK, false).await {
            Ok(returns) => returns
                .result
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(e) => {
                tracing::trace!("Visibility check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &Selector,
        state: WaitState,
        timeout: Duration,
    ) -> Result<Option<Element>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(element) = self.find_first(selector).await {
                if state == WaitState::Attached || Self::is_visible(&element).await {
                    return Ok(Some(element));
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<Element>> {
        let elements = match selector.kind {
            SelectorKind::XPath => self.page.find_xpaths(selector.query.as_str()).await,
            SelectorKind::Css => self.page.find_elements(selector.query.as_str()).await,
        };
        elements.with_context(|| format!("query for {selector} failed"))
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element
            .attribute(name)
            .await
            .with_context(|| format!("failed to read attribute {name}"))
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element.click().await.context("click failed")?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let script = format!(
            r#"(async () => {{
                const timeoutMs = {timeout_ms};
                const idleMs = {NETWORK_IDLE_MS};
                const interval = 100;
                const start = Date.now();
                let lastCount = performance.getEntriesByType('resource').length;
                let stableMs = 0;
                while (Date.now() - start < timeoutMs) {{
                    await new Promise(r => setTimeout(r, interval));
                    const count = performance.getEntriesByType('resource').length;
                    if (document.readyState === 'complete' && count === lastCount) {{
                        stableMs += interval;
                        if (stableMs >= idleMs) {{
                            return true;
                        }}
                    }} else {{
                        stableMs = 0;
                    }}
                    lastCount = count;
                }}
                return false;
            }})()"#
        );

        let idle: bool = self
            .page
            .evaluate(script)
            .await
            .context("network idle check failed")?
            .into_value()
            .map_err(|e| anyhow!("unexpected network idle check result: {e:?}"))?;

        if !idle {
            bail!("network did not become idle within {timeout_ms}ms");
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .context("failed to get URL")?
            .ok_or_else(|| anyhow!("page has no URL"))
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn close(self) -> Result<()> {
        let closed = self.page.close().await.context("failed to close page");

        // Disposing the context also closes the page if the close above failed
        let disposed = self
            .browser
            .lock()
            .await
            .dispose_browser_context(self.context_id)
            .await
            .context("failed to dispose browser context");

        closed.and(disposed)
    }
}

//! In-memory page and sink used by the crawler unit tests.

use crate::browser::{Browser, BrowserPage, Selector, WaitState};
use crate::output::{LinkSink, OutputError, OutputResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeElement {
    Link(usize),
    Control(Selector),
}

#[derive(Default)]
pub(crate) struct FakePage {
    hrefs: Vec<Option<String>>,
    visible: Mutex<HashSet<Selector>>,
    broken: Mutex<HashSet<Selector>>,
    failing_attributes: Mutex<HashSet<usize>>,
    attribute_delays: Mutex<HashMap<usize, Duration>>,
    clicks: Mutex<Vec<Selector>>,
    network_never_idle: Mutex<bool>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_hrefs(hrefs: Vec<Option<&str>>) -> Self {
        Self {
            hrefs: hrefs.into_iter().map(|h| h.map(String::from)).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn link_elements(&self) -> Vec<FakeElement> {
        (0..self.hrefs.len()).map(FakeElement::Link).collect()
    }

    pub(crate) fn show(&self, selector: Selector) {
        self.visible.lock().unwrap().insert(selector);
    }

    pub(crate) fn break_selector(&self, selector: Selector) {
        self.broken.lock().unwrap().insert(selector);
    }

    pub(crate) fn fail_attribute_for(&self, index: usize) {
        self.failing_attributes.lock().unwrap().insert(index);
    }

    pub(crate) fn delay_attribute_for(&self, index: usize, delay: Duration) {
        self.attribute_delays.lock().unwrap().insert(index, delay);
    }

    pub(crate) fn never_idle(&self) {
        *self.network_never_idle.lock().unwrap() = true;
    }

    pub(crate) fn clicks(&self) -> Vec<Selector> {
        self.clicks.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    type Element = FakeElement;

    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &Selector,
        _state: WaitState,
        _timeout: Duration,
    ) -> Result<Option<FakeElement>> {
        if self.broken.lock().unwrap().contains(selector) {
            return Err(anyhow!("invalid selector {}", selector));
        }
        if self.visible.lock().unwrap().contains(selector) {
            return Ok(Some(FakeElement::Control(selector.clone())));
        }
        Ok(None)
    }

    async fn query_all(&self, _selector: &Selector) -> Result<Vec<FakeElement>> {
        Ok(self.link_elements())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let FakeElement::Link(index) = element else {
            return Ok(None);
        };

        let delay = self.attribute_delays.lock().unwrap().get(index).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_attributes.lock().unwrap().contains(index) {
            return Err(anyhow!("element {} detached", index));
        }

        assert_eq!(name, "href");
        Ok(self.hrefs[*index].clone())
    }

    async fn click(&self, element: &FakeElement) -> Result<()> {
        match element {
            FakeElement::Control(selector) => {
                self.clicks.lock().unwrap().push(selector.clone());
                Ok(())
            }
            FakeElement::Link(index) => Err(anyhow!("unexpected click on link {}", index)),
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        if *self.network_never_idle.lock().unwrap() {
            return Err(anyhow!("network did not become idle within {:?}", timeout));
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://example.com/search".to_string())
    }

    async fn content(&self) -> Result<String> {
        Ok("<html></html>".to_string())
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Opens pages that all show the same links and controls
#[derive(Default)]
pub(crate) struct FakeBrowser {
    hrefs: Vec<String>,
    visible: Vec<Selector>,
    opened: std::sync::atomic::AtomicUsize,
}

impl FakeBrowser {
    pub(crate) fn new(hrefs: &[&str], visible: Vec<Selector>) -> Self {
        Self {
            hrefs: hrefs.iter().map(|h| h.to_string()).collect(),
            visible,
            opened: Default::default(),
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    type Page = FakePage;

    async fn new_page(&self) -> Result<FakePage> {
        self.opened.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let page = FakePage::with_hrefs(self.hrefs.iter().map(|h| Some(h.as_str())).collect());
        for selector in &self.visible {
            page.show(selector.clone());
        }
        Ok(page)
    }
}

#[derive(Default)]
pub(crate) struct MemorySink {
    urls: tokio::sync::Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl MemorySink {
    pub(crate) fn failing_on(url: &str) -> Self {
        Self {
            fail_on: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub(crate) async fn urls(&self) -> Vec<String> {
        self.urls.lock().await.clone()
    }
}

#[async_trait]
impl LinkSink for MemorySink {
    async fn append_link(&self, url: &str) -> OutputResult<()> {
        if self.fail_on.as_deref() == Some(url) {
            return Err(OutputError::Write(format!("disk full writing {}", url)));
        }
        self.urls.lock().await.push(url.to_string());
        Ok(())
    }
}

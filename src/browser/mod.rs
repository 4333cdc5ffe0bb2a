//! Browser abstraction used by the crawler
//!
//! Defines the `Browser` and `BrowserPage` traits that abstract over the
//! automation driver (currently Chromium via chromiumoxide). The crawler only
//! needs a small surface: open a page, navigate, wait for and query selectors,
//! read attributes, click, wait for the network to settle, and read the page.

pub mod chromium;

pub use chromium::{ChromiumBrowser, ChromiumPage};

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Query language of a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    /// XPath expression
    XPath,
    /// CSS selector
    Css,
}

impl SelectorKind {
    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XPath => "xpath",
            Self::Css => "css",
        }
    }
}

/// A single selector strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub kind: SelectorKind,
    pub query: String,
}

impl Selector {
    pub fn new(kind: SelectorKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
        }
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(SelectorKind::XPath, query)
    }

    pub fn css(query: impl Into<String>) -> Self {
        Self::new(SelectorKind::Css, query)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind.as_str(), self.query)
    }
}

/// Element condition awaited by `wait_for_selector`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Present in the DOM
    Attached,
    /// Present and rendered with a non-empty box
    Visible,
}

/// A browser engine that can open pages.
#[async_trait]
pub trait Browser: Send + Sync {
    type Page: BrowserPage;

    /// Open a page in a fresh, isolated browsing context.
    async fn new_page(&self) -> Result<Self::Page>;
}

/// A single page (tab) driven by the crawler.
///
/// Implementations must allow concurrent read-only calls (`attribute`,
/// `current_url`) while the owner holds the page, since detail links are read
/// by several tasks at once.
#[async_trait]
pub trait BrowserPage: Send + Sync + 'static {
    /// Live handle to an element on this page.
    type Element: Send + Sync + 'static;

    /// Navigate to a URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until the first match of `selector` reaches `state`.
    ///
    /// Returns `Ok(None)` when the timeout elapses first.
    async fn wait_for_selector(
        &self,
        selector: &Selector,
        state: WaitState,
        timeout: Duration,
    ) -> Result<Option<Self::Element>>;

    /// Return every element currently matching `selector`.
    async fn query_all(&self, selector: &Selector) -> Result<Vec<Self::Element>>;

    /// Read an attribute of an element.
    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Click an element.
    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Wait until network activity has settled.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()>;

    /// The page's current address.
    async fn current_url(&self) -> Result<String>;

    /// Full page markup.
    async fn content(&self) -> Result<String>;

    /// Close this page and its context.
    async fn close(self) -> Result<()>;
}

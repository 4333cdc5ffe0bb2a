//! Element locator
//!
//! Resolves an `ElementRef` to a live, visible element by trying its selector
//! strategies in priority order (xpath, then CSS). Absence is a normal outcome
//! here: the locator logs and returns `None`, and callers decide whether that
//! is fatal.

use crate::browser::{BrowserPage, WaitState};
use crate::plan::ElementRef;
use std::time::Duration;

/// Finds visible elements for element references
#[derive(Debug, Clone, Copy)]
pub struct ElementLocator {
    timeout: Duration,
}

impl ElementLocator {
    /// Creates a locator waiting up to `timeout` per selector strategy
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Timeout applied to each strategy
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Locates the first visible match of `element`
    ///
    /// Each strategy waits up to the locator timeout. A strategy that times out
    /// or errors hands over to the next one.
    ///
    /// # Returns
    ///
    /// * `Some(handle)` - The element is present and visible
    /// * `None` - No selector configured, or no strategy produced a visible match
    pub async fn locate<P: BrowserPage>(
        &self,
        page: &P,
        element: &ElementRef,
    ) -> Option<P::Element> {
        let strategies = element.strategies();
        if strategies.is_empty() {
            tracing::error!("No valid selector provided for element {}", element);
            return None;
        }

        tracing::debug!("Attempting to find element: {}", element);

        for selector in &strategies {
            match page
                .wait_for_selector(selector, WaitState::Visible, self.timeout)
                .await
            {
                Ok(Some(handle)) => {
                    tracing::debug!("Element found: {} via {}", element.description(), selector);
                    return Some(handle);
                }
                Ok(None) => {
                    tracing::debug!(
                        "Element {} not visible via {} within {:?}",
                        element.description(),
                        selector,
                        self.timeout
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Error finding element {} via {}: {}",
                        element.description(),
                        selector,
                        e
                    );
                }
            }
        }

        tracing::info!("Element not found: {}", element);
        None
    }
}

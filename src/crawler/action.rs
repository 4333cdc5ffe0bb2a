//! Action executor
//!
//! Clicks located elements and waits for the page's network activity to
//! settle, so callers always observe a stable DOM afterwards.

use crate::browser::BrowserPage;
use crate::crawler::locator::ElementLocator;
use crate::plan::ElementRef;
use crate::HarvestError;
use std::time::Duration;

/// Performs clicks on element references
#[derive(Debug, Clone, Copy)]
pub struct ActionExecutor {
    locator: ElementLocator,
    settle_timeout: Duration,
}

impl ActionExecutor {
    /// Creates an executor using `locator` and bounding the post-click settle by `settle_timeout`
    pub fn new(locator: ElementLocator, settle_timeout: Duration) -> Self {
        Self {
            locator,
            settle_timeout,
        }
    }

    /// Locates `element` and clicks it
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Clicked and the network settled
    /// * `Err(HarvestError::NoSelectorProvided)` - The reference carries no selector
    /// * `Err(HarvestError::ElementNotFound)` - No visible match within the timeout
    /// * `Err(HarvestError::Browser)` - The click or the settle wait failed
    pub async fn click<P: BrowserPage>(
        &self,
        page: &P,
        element: &ElementRef,
    ) -> Result<(), HarvestError> {
        if !element.has_selector() {
            return Err(HarvestError::NoSelectorProvided {
                description: element.description().to_string(),
            });
        }

        let handle = match self.locator.locate(page, element).await {
            Some(handle) => handle,
            None => {
                tracing::error!("Element not found for click: {}", element.description());
                return Err(HarvestError::ElementNotFound {
                    description: element.description().to_string(),
                });
            }
        };

        self.click_located(page, &handle, element).await
    }

    /// Clicks an element that was already located
    pub async fn click_located<P: BrowserPage>(
        &self,
        page: &P,
        handle: &P::Element,
        element: &ElementRef,
    ) -> Result<(), HarvestError> {
        page.click(handle).await?;
        page.wait_for_network_idle(self.settle_timeout).await?;

        tracing::info!("Clicked element {}", element.description());
        Ok(())
    }
}

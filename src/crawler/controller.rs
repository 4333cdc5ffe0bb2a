//! Pagination controller - the crawl state machine
//!
//! Drives one browser page through a search plan:
//! - Loads the search page and submits the search
//! - Waits for result pages and collects detail links
//! - Dispatches links in windows of bounded size
//! - Follows the next-page control until it disappears
//!
//! Page-level errors send the machine back to `AwaitingResults` for the same
//! page until the error budget is used up.

use crate::browser::BrowserPage;
use crate::config::CrawlerConfig;
use crate::crawler::action::ActionExecutor;
use crate::crawler::dispatcher::{plan_windows, BatchSummary, Dispatcher};
use crate::crawler::locator::ElementLocator;
use crate::crawler::report::CrawlReport;
use crate::output::LinkSink;
use crate::plan::SearchPlan;
use crate::state::{CrawlPhase, CrawlState};
use crate::{HarvestError, UrlError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Runs the link phase of one job against a single page
pub struct PaginationController<P: BrowserPage> {
    page: Arc<P>,
    plan: SearchPlan,
    config: CrawlerConfig,
    locator: ElementLocator,
    actions: ActionExecutor,
    dispatcher: Dispatcher<P>,
    state: CrawlState,
    links: BatchSummary,
    batch: Vec<P::Element>,
}

impl<P: BrowserPage> PaginationController<P> {
    /// Creates a controller positioned at the configured start page
    ///
    /// # Arguments
    ///
    /// * `page` - Page owned by this crawl; dispatcher tasks share it read-only
    /// * `plan` - Search plan describing the site
    /// * `config` - Concurrency, limit, timeout and error budget settings
    /// * `sink` - Destination for harvested links
    pub fn new(
        page: Arc<P>,
        plan: SearchPlan,
        config: CrawlerConfig,
        sink: Arc<dyn LinkSink>,
    ) -> Self {
        let locator = ElementLocator::new(config.timeout());
        let actions = ActionExecutor::new(locator, config.timeout());
        let dispatcher = Dispatcher::new(Arc::clone(&page), sink);
        let state = CrawlState::new(config.start_page);

        Self {
            page,
            plan,
            config,
            locator,
            actions,
            dispatcher,
            state,
            links: BatchSummary::default(),
            batch: Vec::new(),
        }
    }

    /// Current crawl state
    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Link counters accumulated so far
    pub fn links(&self) -> &BatchSummary {
        &self.links
    }

    /// Report for the crawl as it stands
    pub fn report(&self) -> CrawlReport {
        CrawlReport::success(&self.state, &self.links)
    }

    /// Runs the state machine until it reaches a terminal phase
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl ran out of pages or reached its limit
    /// * `Err(HarvestError::ErrorBudgetExhausted)` - Too many consecutive page errors;
    ///   carries the error that used up the budget
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        tracing::info!(
            "Starting crawl of {} at page {}",
            self.plan.search_page_url,
            self.state.page
        );

        while !self.state.phase.is_terminal() {
            if let Err(e) = self.step().await {
                self.handle_error(e)?;
            }
        }

        tracing::info!(
            "Crawl complete: {} pages, {} links saved, {} windows",
            self.state.pages_visited,
            self.links.saved,
            self.state.windows_dispatched
        );

        Ok(self.report())
    }

    /// Executes the work of the current phase and moves to the next one
    async fn step(&mut self) -> Result<(), HarvestError> {
        match self.state.phase {
            CrawlPhase::SubmittingSearch => self.submit_search().await,
            CrawlPhase::AwaitingResults => self.await_results().await,
            CrawlPhase::Harvesting => self.harvest(),
            CrawlPhase::Dispatching => self.dispatch().await,
            CrawlPhase::Advancing => self.advance().await,
            CrawlPhase::Done | CrawlPhase::Failed => Ok(()),
        }
    }

    fn handle_error(&mut self, error: HarvestError) -> Result<(), HarvestError> {
        tracing::error!(
            "Error on page {} during {}: {}",
            self.state.page,
            self.state.phase,
            error
        );

        if self.state.record_error(self.config.error_budget) {
            let attempts = self.state.consecutive_errors;
            self.state.transition(CrawlPhase::Failed)?;
            tracing::error!("Giving up after {} consecutive errors", attempts);
            return Err(HarvestError::ErrorBudgetExhausted {
                attempts,
                source: Box::new(error),
            });
        }

        tracing::warn!(
            "Retrying page {} (attempt {} of {})",
            self.state.page,
            self.state.consecutive_errors + 1,
            self.config.error_budget
        );
        self.batch.clear();
        self.state.transition(CrawlPhase::AwaitingResults)
    }

    async fn submit_search(&mut self) -> Result<(), HarvestError> {
        let page = self.page.as_ref();

        tracing::info!("Navigating to {}", self.plan.search_page_url);
        page.navigate(&self.plan.search_page_url).await?;
        self.settle().await;

        for step in &self.plan.pre_search_steps {
            self.actions.click(page, step).await?;
        }

        if self.plan.skip_search {
            tracing::info!("Skipping search submission");
        } else {
            self.actions.click(page, &self.plan.submit_button).await?;
        }

        for step in &self.plan.post_search_steps {
            self.actions.click(page, step).await?;
        }

        self.wait_for_results().await?;
        self.state.transition(CrawlPhase::AwaitingResults)
    }

    async fn await_results(&mut self) -> Result<(), HarvestError> {
        self.wait_for_results().await?;
        self.batch = self.collect_links().await?;

        tracing::info!(
            "Found {} detail links on page {}",
            self.batch.len(),
            self.state.page
        );
        self.state.transition(CrawlPhase::Harvesting)
    }

    fn harvest(&mut self) -> Result<(), HarvestError> {
        if self.batch.is_empty() {
            tracing::info!("No detail links on page {}", self.state.page);
            return self.state.transition(CrawlPhase::Advancing);
        }

        self.state.record_page_visit();
        self.state.transition(CrawlPhase::Dispatching)
    }

    async fn dispatch(&mut self) -> Result<(), HarvestError> {
        let batch = std::mem::take(&mut self.batch);
        let current = self.page.current_url().await?;
        let base = Url::parse(&current).map_err(|e| UrlError::Parse(e.to_string()))?;

        let windows = plan_windows(
            batch.len(),
            self.config.max_concurrent,
            self.state.remaining(self.config.limit),
        );
        let mut links = batch.into_iter();

        for window in windows {
            let chunk: Vec<P::Element> = links.by_ref().take(window.len()).collect();
            let summary = self.dispatcher.run_batch(chunk, &base).await;

            self.state.record_window(summary.dispatched);
            self.links.merge(&summary);
            tracing::info!(
                "Page {}: window {}..{} done ({} saved)",
                self.state.page,
                window.start,
                window.end,
                summary.saved
            );
        }

        if self.state.limit_reached(self.config.limit) {
            tracing::info!("Link limit of {} reached", self.state.processed);
            return self.state.transition(CrawlPhase::Done);
        }

        self.state.transition(CrawlPhase::Advancing)
    }

    async fn advance(&mut self) -> Result<(), HarvestError> {
        let page = self.page.as_ref();
        let next = &self.plan.next_page_button;

        let handle = match self.locator.locate(page, next).await {
            Some(handle) => handle,
            None => {
                tracing::info!("No next page after page {}", self.state.page);
                return self.state.transition(CrawlPhase::Done);
            }
        };

        self.actions.click_located(page, &handle, next).await?;
        self.state.advance_page();

        tracing::info!("Moved to page {}", self.state.page);
        self.state.transition(CrawlPhase::AwaitingResults)
    }

    /// Waits until at least one detail link is visible
    async fn wait_for_results(&self) -> Result<(), HarvestError> {
        let detail = &self.plan.detail_page_link;
        match self.locator.locate(self.page.as_ref(), detail).await {
            Some(_) => Ok(()),
            None => Err(HarvestError::ElementNotFound {
                description: detail.description().to_string(),
            }),
        }
    }

    /// Collects every detail link using the first strategy with matches
    ///
    /// A later strategy is only tried when the earlier one matched nothing. A
    /// driver error is returned so the page is retried instead of being taken
    /// for an empty one.
    async fn collect_links(&self) -> Result<Vec<P::Element>, HarvestError> {
        for selector in self.plan.detail_page_link.strategies() {
            let found = self.page.query_all(&selector).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            tracing::debug!("No detail links via {}", selector);
        }
        Ok(Vec::new())
    }

    async fn settle(&self) {
        let min = self.config.settle_delay_min_ms;
        let max = self.config.settle_delay_max_ms.max(min);
        let delay = rand::thread_rng().gen_range(min..=max);

        tracing::debug!("Waiting {}ms for the search page to settle", delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

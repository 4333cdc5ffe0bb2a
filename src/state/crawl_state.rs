use crate::state::CrawlPhase;
use crate::HarvestError;

/// Tracks the progress of a single crawl
///
/// Created when the crawl starts, mutated once per page iteration and once per
/// dispatched link, and dropped when the crawl ends. Never persisted.
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// Current phase of the state machine
    pub phase: CrawlPhase,

    /// Ordinal of the result page being processed
    pub page: u32,

    /// Number of result pages whose links were harvested
    pub pages_visited: u32,

    /// Number of links handed to the dispatcher so far
    pub processed: usize,

    /// Page errors since the last page completed successfully
    pub consecutive_errors: u32,

    /// Number of dispatcher windows run so far
    pub windows_dispatched: usize,
}

impl CrawlState {
    /// Creates a new CrawlState positioned at `start_page`
    pub fn new(start_page: u32) -> Self {
        Self {
            phase: CrawlPhase::SubmittingSearch,
            page: start_page,
            pages_visited: 0,
            processed: 0,
            consecutive_errors: 0,
            windows_dispatched: 0,
        }
    }

    /// Moves the state machine to `next`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition is allowed
    /// * `Err(HarvestError::InvalidTransition)` - The transition is not part of the machine
    pub fn transition(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!("Page {}: {} -> {}", self.page, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Records a harvested page
    pub fn record_page_visit(&mut self) {
        self.pages_visited += 1;
    }

    /// Records a dispatched window of `links` links
    pub fn record_window(&mut self, links: usize) {
        self.windows_dispatched += 1;
        self.processed += links;
    }

    /// Moves to the next result page and clears the error streak
    pub fn advance_page(&mut self) {
        self.page += 1;
        self.consecutive_errors = 0;
    }

    /// Records a page error
    ///
    /// # Returns
    ///
    /// * `true` - The error budget is exhausted and the crawl must fail
    /// * `false` - The page may be retried
    pub fn record_error(&mut self, budget: u32) -> bool {
        self.consecutive_errors += 1;
        self.consecutive_errors >= budget
    }

    /// Number of links that may still be dispatched under `limit`
    ///
    /// Returns None when there is no limit.
    pub fn remaining(&self, limit: Option<usize>) -> Option<usize> {
        limit.map(|l| l.saturating_sub(self.processed))
    }

    /// Checks whether the optional link limit has been reached
    pub fn limit_reached(&self, limit: Option<usize>) -> bool {
        self.remaining(limit) == Some(0)
    }
}

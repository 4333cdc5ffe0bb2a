//! Crawl report
//!
//! Structured outcome of one link-phase job, printed as JSON by the CLI.

use crate::crawler::dispatcher::BatchSummary;
use crate::state::CrawlState;
use serde::Serialize;

/// Final status of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
}

/// Summary of a finished (or failed) crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub status: ReportStatus,
    pub pages_visited: u32,
    pub links_dispatched: usize,
    pub links_saved: usize,
    pub links_skipped: usize,
    pub links_failed: usize,
    pub windows_dispatched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlReport {
    /// Builds a successful report from the final state and link counters
    pub fn success(state: &CrawlState, links: &BatchSummary) -> Self {
        Self::build(ReportStatus::Success, state, links, None)
    }

    /// Builds an error report carrying the partial counters collected so far
    pub fn failure(state: &CrawlState, links: &BatchSummary, error: impl ToString) -> Self {
        Self::build(ReportStatus::Error, state, links, Some(error.to_string()))
    }

    /// Builds an error report for a job that never reached the crawl loop
    pub fn aborted(error: impl ToString) -> Self {
        Self {
            status: ReportStatus::Error,
            pages_visited: 0,
            links_dispatched: 0,
            links_saved: 0,
            links_skipped: 0,
            links_failed: 0,
            windows_dispatched: 0,
            error: Some(error.to_string()),
        }
    }

    fn build(
        status: ReportStatus,
        state: &CrawlState,
        links: &BatchSummary,
        error: Option<String>,
    ) -> Self {
        Self {
            status,
            pages_visited: state.pages_visited,
            links_dispatched: links.dispatched,
            links_saved: links.saved,
            links_skipped: links.skipped + links.duplicates,
            links_failed: links.failed,
            windows_dispatched: state.windows_dispatched,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Success
    }
}

/// Phase definitions for the pagination state machine
///
/// This module defines every state a crawl can be in while it walks result pages.
use std::fmt;

/// Represents the current phase of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Active Phases =====
    /// Loading the search page and submitting the search form
    SubmittingSearch,

    /// Waiting for detail links to appear on the current page
    AwaitingResults,

    /// Collecting the detail links of the current page
    Harvesting,

    /// Handing link windows to the dispatcher
    Dispatching,

    /// Moving to the next result page
    Advancing,

    // ===== Terminal Phases =====
    /// No further pages; the crawl finished normally
    Done,

    /// The error budget was exhausted
    Failed,
}

impl CrawlPhase {
    /// Returns true if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the crawl is still running
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Checks whether the state machine may move from this phase to `next`
    ///
    /// The error edge (any active phase back to `AwaitingResults`, or to
    /// `Failed`) is always allowed from an active phase.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        if self.is_terminal() {
            return false;
        }

        if matches!(next, AwaitingResults | Failed) {
            return true;
        }

        matches!(
            (self, next),
            (SubmittingSearch, Done)
                | (AwaitingResults, Harvesting)
                | (Harvesting, Dispatching)
                | (Harvesting, Advancing)
                | (Harvesting, Done)
                | (Dispatching, Advancing)
                | (Dispatching, Done)
                | (Advancing, Done)
        )
    }

    /// Name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmittingSearch => "submitting_search",
            Self::AwaitingResults => "awaiting_results",
            Self::Harvesting => "harvesting",
            Self::Dispatching => "dispatching",
            Self::Advancing => "advancing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

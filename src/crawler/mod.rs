//! Crawler module for the link phase
//!
//! This module contains the paginated crawl logic, including:
//! - Locating plan elements through ordered selector strategies
//! - Clicking controls and waiting for the page to settle
//! - Windowed, bounded-concurrency dispatch of detail links
//! - The pagination state machine tying it all together

mod action;
mod controller;
mod dispatcher;
mod locator;
mod report;

#[cfg(test)]
pub(crate) mod fake_page;

pub use action::ActionExecutor;
pub use controller::PaginationController;
pub use dispatcher::{plan_windows, BatchSummary, Dispatcher, LinkOutcome};
pub use locator::ElementLocator;
pub use report::{CrawlReport, ReportStatus};

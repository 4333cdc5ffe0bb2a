//! Bounded concurrent dispatcher
//!
//! Runs one task per detail link of a window. Each task reads the link's href,
//! filters out unusable values, resolves the href against the results page and
//! hands the URL to the sink. A failing task is logged and counted; it never
//! affects its siblings or the controller.

use crate::browser::BrowserPage;
use crate::output::LinkSink;
use crate::url::{check_href, resolve_href_with, HrefRejection};
use crate::HarvestError;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

/// What happened to a single link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Resolved and written to the sink
    Saved(String),
    /// Href was not a usable link
    Skipped(HrefRejection),
    /// Already written earlier in this crawl
    Duplicate(String),
}

/// Counters for one or more dispatched windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub dispatched: usize,
    pub saved: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Adds another summary's counters to this one
    pub fn merge(&mut self, other: &BatchSummary) {
        self.dispatched += other.dispatched;
        self.saved += other.saved;
        self.skipped += other.skipped;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }

    fn record(&mut self, outcome: &Result<LinkOutcome, ()>) {
        match outcome {
            Ok(LinkOutcome::Saved(_)) => self.saved += 1,
            Ok(LinkOutcome::Skipped(_)) => self.skipped += 1,
            Ok(LinkOutcome::Duplicate(_)) => self.duplicates += 1,
            Err(()) => self.failed += 1,
        }
    }
}

/// Splits `total` links into consecutive windows of at most `max_concurrent`
///
/// When `remaining` is set, windows stop once that many links are covered.
///
/// # Examples
///
/// ```
/// use sumi_harvest::crawler::plan_windows;
///
/// assert_eq!(plan_windows(25, 10, None), vec![0..10, 10..20, 20..25]);
/// assert_eq!(plan_windows(25, 10, Some(12)), vec![0..10, 10..12]);
/// ```
pub fn plan_windows(total: usize, max_concurrent: usize, remaining: Option<usize>) -> Vec<Range<usize>> {
    let step = max_concurrent.max(1);
    let end = remaining.map_or(total, |r| r.min(total));

    (0..end)
        .step_by(step)
        .map(|start| start..(start + step).min(end))
        .collect()
}

/// Runs windows of detail-link tasks against a shared page and sink
pub struct Dispatcher<P: BrowserPage> {
    page: Arc<P>,
    sink: Arc<dyn LinkSink>,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl<P: BrowserPage> Dispatcher<P> {
    /// Creates a dispatcher reading links from `page` and writing to `sink`
    pub fn new(page: Arc<P>, sink: Arc<dyn LinkSink>) -> Self {
        Self {
            page,
            sink,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of distinct URLs written so far
    pub async fn saved_count(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Processes one window of links and waits for every task to finish
    ///
    /// # Arguments
    ///
    /// * `links` - Link elements of the window (already capped by the caller)
    /// * `base` - Address of the results page the links were found on
    ///
    /// # Returns
    ///
    /// Counters for the window. Task failures, including panics, are logged and
    /// counted as `failed`; they are never returned as errors.
    pub async fn run_batch(&self, links: Vec<P::Element>, base: &Url) -> BatchSummary {
        let base = Arc::new(base.clone());
        let mut tasks = JoinSet::new();
        let mut summary = BatchSummary {
            dispatched: links.len(),
            ..BatchSummary::default()
        };

        for link in links {
            let page = Arc::clone(&self.page);
            let sink = Arc::clone(&self.sink);
            let seen = Arc::clone(&self.seen);
            let base = Arc::clone(&base);

            tasks.spawn(async move {
                match process_link(page.as_ref(), sink.as_ref(), &seen, &link, &base).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) => {
                        tracing::error!("Error processing detail link: {}", e);
                        Err(())
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                tracing::error!("Detail link task aborted: {}", e);
                Err(())
            });
            summary.record(&outcome);
        }

        tracing::debug!(
            "Window finished: {} dispatched, {} saved, {} skipped, {} duplicates, {} failed",
            summary.dispatched,
            summary.saved,
            summary.skipped,
            summary.duplicates,
            summary.failed
        );

        summary
    }
}

/// Reads, filters, resolves and saves a single link
async fn process_link<P: BrowserPage>(
    page: &P,
    sink: &dyn LinkSink,
    seen: &Mutex<HashSet<String>>,
    link: &P::Element,
    base: &Url,
) -> Result<LinkOutcome, HarvestError> {
    let href = page.attribute(link, "href").await?;

    let href = match check_href(href.as_deref()) {
        Ok(href) => href,
        Err(reason) => {
            tracing::debug!("Skipping {} href {:?}", reason.as_str(), href);
            return Ok(LinkOutcome::Skipped(reason));
        }
    };

    let url = resolve_href_with(base, href)?;

    if !seen.lock().await.insert(url.clone()) {
        tracing::debug!("Skipping already saved url {}", url);
        return Ok(LinkOutcome::Duplicate(url));
    }

    if let Err(e) = sink.append_link(&url).await {
        seen.lock().await.remove(&url);
        return Err(e.into());
    }

    Ok(LinkOutcome::Saved(url))
}

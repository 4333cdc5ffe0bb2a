//! Record phase
//!
//! Revisits every link harvested by the link phase and stores one structured
//! record per page in the job's `extracted_data.json`.

mod extractor;

pub use extractor::{PageSummaryExtractor, Record, RecordExtractor};

use crate::browser::{Browser, BrowserPage};
use crate::output::{read_links, RecordFileSink, LINKS_FILE_NAME};
use crate::{HarvestError, UrlError};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Counters for one record-phase run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub urls: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Extracts a record for every harvested link of a job
///
/// # Arguments
///
/// * `browser` - Browser used to open one fresh page per URL
/// * `output_dir` - Job directory holding `extracted_urls.txt`
/// * `extractor` - Transform applied to each page's markup
/// * `max_concurrent` - Maximum number of pages open at once
/// * `timeout` - Bound on the network-idle wait after navigation
///
/// # Returns
///
/// Counters for the run. A missing links file is logged and yields an empty
/// summary; per-URL failures are logged and counted.
pub async fn run_extraction<B>(
    browser: Arc<B>,
    output_dir: &Path,
    extractor: Arc<dyn RecordExtractor>,
    max_concurrent: usize,
    timeout: Duration,
) -> Result<ExtractionSummary, HarvestError>
where
    B: Browser + 'static,
{
    let links_path = output_dir.join(LINKS_FILE_NAME);
    if !links_path.exists() {
        tracing::error!("Links file not found: {}", links_path.display());
        return Ok(ExtractionSummary::default());
    }

    let urls = read_links(&links_path).await?;
    tracing::info!("Extracting records for {} urls", urls.len());

    let sink = Arc::new(RecordFileSink::in_dir(output_dir));
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();
    let mut summary = ExtractionSummary {
        urls: urls.len(),
        ..ExtractionSummary::default()
    };

    for url in urls {
        let browser = Arc::clone(&browser);
        let extractor = Arc::clone(&extractor);
        let sink = Arc::clone(&sink);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| anyhow::anyhow!("extraction pool closed: {}", e))?;
            extract_one(browser.as_ref(), &url, extractor.as_ref(), &sink, timeout)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to extract {}: {}", url, e);
                    e
                })
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => summary.saved += 1,
            Ok(Err(_)) => summary.failed += 1,
            Err(e) => {
                tracing::error!("Extraction task aborted: {}", e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Record phase finished: {} saved, {} failed",
        summary.saved,
        summary.failed
    );
    Ok(summary)
}

async fn extract_one<B: Browser>(
    browser: &B,
    url: &str,
    extractor: &dyn RecordExtractor,
    sink: &RecordFileSink,
    timeout: Duration,
) -> Result<(), HarvestError> {
    let page = browser.new_page().await?;
    let scraped = scrape(&page, url, extractor, timeout).await;

    if let Err(e) = page.close().await {
        tracing::warn!("Failed to close page for {}: {}", url, e);
    }

    let record = scraped?;
    let total = sink.append_record(&Value::Object(record)).await?;
    tracing::debug!("Saved record for {} ({} total)", url, total);
    Ok(())
}

async fn scrape<P: BrowserPage>(
    page: &P,
    url: &str,
    extractor: &dyn RecordExtractor,
    timeout: Duration,
) -> Result<Record, HarvestError> {
    let page_url = Url::parse(url).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))?;

    page.navigate(url).await?;
    page.wait_for_network_idle(timeout).await?;
    let html = page.content().await?;

    let mut record = extractor.extract(&html, &page_url)?;
    record.insert("source_url".to_string(), url.into());
    record.insert(
        "extracted_at".to_string(),
        chrono::Utc::now().to_rfc3339().into(),
    );
    Ok(record)
}

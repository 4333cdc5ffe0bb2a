//! Job runner
//!
//! Runs the link phase or the record phase for the jobs listed in the
//! configuration. Each job gets its own page, its own output directory and a
//! `job` tracing span carrying its key; jobs share one browser and run with
//! bounded parallelism.

use crate::browser::{Browser, BrowserPage};
use crate::config::{Config, JobEntry};
use crate::crawler::{CrawlReport, PaginationController};
use crate::extract::{run_extraction, ExtractionSummary, RecordExtractor};
use crate::output::LinkFileSink;
use crate::plan::{load_plan, SearchPlan};
use crate::HarvestError;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// Runs the link phase for every configured job
///
/// At most `output.max-parallel-jobs` jobs run at once. Reports are returned
/// in configuration order.
pub async fn run_link_jobs<B: Browser>(browser: &B, config: &Config) -> Vec<(String, CrawlReport)> {
    stream::iter(&config.jobs)
        .map(|job| async move { (job.key.clone(), run_link_job(browser, job, config).await) })
        .buffered(config.output.max_parallel_jobs.max(1))
        .collect()
        .await
}

/// Formats one job's report as a single JSON line
pub fn report_line(key: &str, report: &CrawlReport) -> serde_json::Result<String> {
    serde_json::to_string(&serde_json::json!({ "job": key, "report": report }))
}

/// Runs the link phase for one job
///
/// Never fails: setup errors and crawl failures are folded into an error
/// report carrying whatever progress was made.
pub async fn run_link_job<B: Browser>(browser: &B, job: &JobEntry, config: &Config) -> CrawlReport {
    let span = tracing::info_span!("job", key = %job.key);
    crawl_job(browser, job, config).instrument(span).await
}

async fn crawl_job<B: Browser>(browser: &B, job: &JobEntry, config: &Config) -> CrawlReport {
    let (output_dir, plan) = match prepare_job(job, config).await {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!("Failed to prepare job: {}", e);
            return CrawlReport::aborted(e);
        }
    };

    let page = match browser.new_page().await {
        Ok(page) => Arc::new(page),
        Err(e) => {
            tracing::error!("Failed to open page: {}", e);
            return CrawlReport::aborted(e);
        }
    };

    let sink = Arc::new(LinkFileSink::in_dir(&output_dir));
    let mut controller =
        PaginationController::new(Arc::clone(&page), plan, config.crawler.clone(), sink);

    let report = match controller.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            CrawlReport::failure(controller.state(), controller.links(), &e)
        }
    };
    drop(controller);

    match Arc::try_unwrap(page) {
        Ok(page) => {
            if let Err(e) = page.close().await {
                tracing::warn!("Failed to close page: {}", e);
            }
        }
        Err(_) => tracing::warn!("Page still in use after crawl; leaving it open"),
    }

    report
}

/// Creates the job's output directory and loads its search plan
async fn prepare_job(job: &JobEntry, config: &Config) -> Result<(PathBuf, SearchPlan), HarvestError> {
    let output_dir = job.output_dir(&config.output);
    tokio::fs::create_dir_all(&output_dir).await?;

    let plan = load_plan(&job.plan_path(&config.output))?;
    tracing::info!(
        "Loaded plan for {} (output: {})",
        plan.search_page_url,
        output_dir.display()
    );
    Ok((output_dir, plan))
}

/// Runs the record phase for every configured job
pub async fn run_extract_jobs<B>(
    browser: Arc<B>,
    config: &Config,
    extractor: Arc<dyn RecordExtractor>,
) -> Vec<(String, Result<ExtractionSummary, HarvestError>)>
where
    B: Browser + 'static,
{
    let browser = &browser;
    let extractor = &extractor;

    stream::iter(&config.jobs)
        .map(|job| async move {
            let summary =
                run_extract_job(Arc::clone(browser), job, config, Arc::clone(extractor)).await;
            (job.key.clone(), summary)
        })
        .buffered(config.output.max_parallel_jobs.max(1))
        .collect()
        .await
}

/// Runs the record phase for one job
pub async fn run_extract_job<B>(
    browser: Arc<B>,
    job: &JobEntry,
    config: &Config,
    extractor: Arc<dyn RecordExtractor>,
) -> Result<ExtractionSummary, HarvestError>
where
    B: Browser + 'static,
{
    let span = tracing::info_span!("job", key = %job.key);
    let output_dir = job.output_dir(&config.output);

    run_extraction(
        browser,
        &output_dir,
        extractor,
        config.crawler.max_concurrent,
        config.crawler.timeout(),
    )
    .instrument(span)
    .await
}

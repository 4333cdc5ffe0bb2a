//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest link harvester.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_harvest::browser::ChromiumBrowser;
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::extract::PageSummaryExtractor;
use sumi_harvest::job::{report_line, run_extract_jobs, run_link_jobs};
use sumi_harvest::plan::load_plan;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a schema-driven paginated link harvester
///
/// Sumi-Harvest drives a headless browser through each job's search plan,
/// walks every result page and appends the detail links it finds to the
/// job's output directory. With --extract it revisits the harvested links and
/// stores one structured record per page.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A schema-driven paginated link harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and every search plan, then show what would run
    #[arg(long, conflicts_with = "extract")]
    dry_run: bool,

    /// Run the record phase over previously harvested links
    #[arg(long, conflicts_with = "dry_run")]
    extract: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let browser = Arc::new(ChromiumBrowser::launch(&config.browser).await?);

    let failed = if cli.extract {
        handle_extract(Arc::clone(&browser), &config).await
    } else {
        handle_harvest(browser.as_ref(), &config).await
    };

    match Arc::try_unwrap(browser) {
        Ok(browser) => browser.shutdown().await?,
        Err(_) => tracing::warn!("Browser still shared at exit; not shutting it down"),
    }

    if failed > 0 {
        anyhow::bail!("{} of {} jobs failed", failed, config.jobs.len());
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and plans, shows what would run
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max concurrent links: {}", config.crawler.max_concurrent);
    println!("  Start page: {}", config.crawler.start_page);
    match config.crawler.limit {
        Some(limit) => println!("  Link limit: {}", limit),
        None => println!("  Link limit: none"),
    }
    println!("  Error budget: {}", config.crawler.error_budget);
    println!("  Timeout: {}ms", config.crawler.timeout_ms);
    println!(
        "  Settle delay: {}-{}ms",
        config.crawler.settle_delay_min_ms, config.crawler.settle_delay_max_ms
    );

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    if let Some(path) = &config.browser.chrome_path {
        println!("  Executable: {}", path.display());
    }

    println!("\nOutput:");
    println!("  Root: {}", config.output.root.display());
    println!("  Max parallel jobs: {}", config.output.max_parallel_jobs);

    println!("\nJobs ({}):", config.jobs.len());
    let mut invalid = 0;
    for job in &config.jobs {
        let plan_path = job.plan_path(&config.output);
        match load_plan(&plan_path) {
            Ok(plan) => {
                println!("  - {} ({})", job.key, plan.search_page_url);
                println!("    * plan: {}", plan_path.display());
                println!("    * output: {}", job.output_dir(&config.output).display());
            }
            Err(e) => {
                invalid += 1;
                println!("  - {} INVALID: {}", job.key, e);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} search plans are invalid", invalid);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} jobs", config.jobs.len());

    Ok(())
}

/// Handles the default mode: runs the link phase and prints one report per job
///
/// Returns the number of failed jobs.
async fn handle_harvest(browser: &ChromiumBrowser, config: &Config) -> usize {
    tracing::info!("Starting link phase for {} jobs", config.jobs.len());

    let reports = run_link_jobs(browser, config).await;
    let mut failed = 0;

    for (key, report) in &reports {
        if !report.is_success() {
            failed += 1;
        }
        match report_line(key, report) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!("Failed to serialize report for {}: {}", key, e),
        }
    }

    failed
}

/// Handles the --extract mode: runs the record phase for every job
///
/// Returns the number of failed jobs.
async fn handle_extract(browser: Arc<ChromiumBrowser>, config: &Config) -> usize {
    tracing::info!("Starting record phase for {} jobs", config.jobs.len());

    let results = run_extract_jobs(browser, config, Arc::new(PageSummaryExtractor)).await;
    let mut failed = 0;

    for (key, result) in results {
        match result {
            Ok(summary) => println!(
                "{}: {} records saved, {} failed ({} urls)",
                key, summary.saved, summary.failed, summary.urls
            ),
            Err(e) => {
                failed += 1;
                tracing::error!("Record phase failed for {}: {}", key, e);
            }
        }
    }

    failed
}

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobEntry>,
}

/// Pagination and dispatch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of detail links processed concurrently in one window
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Page ordinal the crawl starts counting from
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    /// Optional cap on the total number of links dispatched
    #[serde(default)]
    pub limit: Option<usize>,

    /// Consecutive page errors tolerated before the crawl aborts
    #[serde(rename = "error-budget", default = "default_error_budget")]
    pub error_budget: u32,

    /// Timeout for locating elements and waiting for network idle (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Lower bound of the jittered settle delay after loading the search page
    #[serde(rename = "settle-delay-min-ms", default = "default_settle_min_ms")]
    pub settle_delay_min_ms: u64,

    /// Upper bound of the jittered settle delay after loading the search page
    #[serde(rename = "settle-delay-max-ms", default = "default_settle_max_ms")]
    pub settle_delay_max_ms: u64,
}

impl CrawlerConfig {
    /// Returns the element/network timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            start_page: default_start_page(),
            limit: None,
            error_budget: default_error_budget(),
            timeout_ms: default_timeout_ms(),
            settle_delay_min_ms: default_settle_min_ms(),
            settle_delay_max_ms: default_settle_max_ms(),
        }
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Run Chromium without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit path to the Chromium executable
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<PathBuf>,

    /// Timeout for launching the browser (milliseconds)
    #[serde(rename = "launch-timeout-ms", default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            launch_timeout_ms: default_launch_timeout_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one sub-directory per job key
    pub root: PathBuf,

    /// Maximum number of jobs running at the same time
    #[serde(rename = "max-parallel-jobs", default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,
}

/// A single harvest job
#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    /// Job key, also the name of the job's output directory
    pub key: String,

    /// Path to the search plan JSON (defaults to `<root>/<key>/web_search_schema.json`)
    #[serde(default)]
    pub plan: Option<PathBuf>,
}

impl JobEntry {
    /// Directory receiving this job's output files
    pub fn output_dir(&self, output: &OutputConfig) -> PathBuf {
        output.root.join(&self.key)
    }

    /// Location of this job's search plan
    pub fn plan_path(&self, output: &OutputConfig) -> PathBuf {
        self.plan
            .clone()
            .unwrap_or_else(|| self.output_dir(output).join("web_search_schema.json"))
    }
}

fn default_max_concurrent() -> usize {
    10
}

fn default_start_page() -> u32 {
    1
}

fn default_error_budget() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_settle_min_ms() -> u64 {
    4_000
}

fn default_settle_max_ms() -> u64 {
    6_000
}

fn default_headless() -> bool {
    true
}

fn default_launch_timeout_ms() -> u64 {
    60_000
}

fn default_max_parallel_jobs() -> usize {
    5
}

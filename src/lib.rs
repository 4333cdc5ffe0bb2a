//! Sumi-Harvest: a schema-driven paginated link harvester
//!
//! This crate drives a headless browser through a declarative search plan:
//! it submits a search, walks the result pages, collects detail-page links with
//! bounded concurrency and appends them to durable per-job output. A companion
//! phase revisits the harvested links and stores one structured record per page.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod job;
pub mod output;
pub mod plan;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("No selector provided for element: {description}")]
    NoSelectorProvided { description: String },

    #[error("Element not found for click: {description}")]
    ElementNotFound { description: String },

    #[error("Browser error: {0}")]
    Browser(#[from] anyhow::Error),

    #[error("Crawl aborted after {attempts} consecutive page errors: {source}")]
    ErrorBudgetExhausted {
        attempts: u32,
        source: Box<HarvestError>,
    },

    #[error("Invalid crawl transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Search plan errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read search plan {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse search plan {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid search page URL '{0}'")]
    InvalidUrl(String),

    #[error("Element '{0}' has neither an xpath nor a css selector")]
    MissingSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Unusable href: {0:?}")]
    UnusableHref(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, PaginationController};
pub use plan::{ElementRef, SearchPlan};
pub use state::{CrawlPhase, CrawlState};

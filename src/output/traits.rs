//! Output sink traits and types
//!
//! This module defines the trait interface for link sinks and the error type
//! shared by every output writer.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Timed out waiting for lock file {0}")]
    LockTimeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for harvested detail links
///
/// Sinks are shared by every dispatcher task of a crawl, so implementations
/// must serialize concurrent appends themselves: no partial or interleaved
/// lines, and no lost appends.
#[async_trait]
pub trait LinkSink: Send + Sync {
    /// Appends one fully-qualified URL
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to persist
    async fn append_link(&self, url: &str) -> OutputResult<()>;
}

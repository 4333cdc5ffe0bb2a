use crate::output::traits::{LinkSink, OutputResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File name of the link-phase output inside a job directory
pub const LINKS_FILE_NAME: &str = "extracted_urls.txt";

/// Append-only, newline-delimited URL file
///
/// Each append opens the file in append mode and writes the whole line with a
/// single write while holding the sink's lock, so lines from concurrent
/// dispatcher tasks never interleave.
pub struct LinkFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LinkFileSink {
    /// Creates a sink writing `extracted_urls.txt` inside `output_dir`
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(LINKS_FILE_NAME))
    }

    /// Creates a sink writing to an explicit path
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LinkSink for LinkFileSink {
    async fn append_link(&self, url: &str) -> OutputResult<()> {
        let line = format!("{} \n", url);

        let guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        drop(guard);

        tracing::info!("Saved url -> {} to {}", url, self.path.display());
        Ok(())
    }
}

/// Reads every URL from a link file
///
/// Lines are trimmed and blank lines are skipped.
pub async fn read_links(path: &Path) -> OutputResult<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

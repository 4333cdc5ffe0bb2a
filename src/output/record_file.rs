use crate::output::traits::{OutputError, OutputResult};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

/// File name of the record-phase output inside a job directory
pub const RECORDS_FILE_NAME: &str = "extracted_data.json";

/// How long to wait for another writer's lock file
const LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lock files older than this are left over from a crashed writer
const LOCK_STALE_AFTER: Duration = Duration::from_secs(120);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// JSON array file rewritten atomically on every append
///
/// An append takes the sink's lock plus the co-located `<file>.lock`, reads
/// the current array, pushes the record, writes the whole array to a temporary
/// file in the same directory and renames it over the target. Readers only ever
/// see a complete array; a crash before the rename leaves the previous file
/// untouched.
pub struct RecordFileSink {
    path: PathBuf,
    lock_path: PathBuf,
    lock: Mutex<()>,
}

impl RecordFileSink {
    /// Creates a sink writing `extracted_data.json` inside `output_dir`
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(RECORDS_FILE_NAME))
    }

    /// Creates a sink writing to an explicit path
    pub fn new(path: PathBuf) -> Self {
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");

        Self {
            lock_path: PathBuf::from(lock_name),
            path,
            lock: Mutex::new(()),
        }
    }

    /// Path of the underlying JSON file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the co-located lock file
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Appends one record to the JSON array
    ///
    /// # Arguments
    ///
    /// * `record` - Any serializable record
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of records in the file after the append
    /// * `Err(OutputError)` - The record could not be committed; the file keeps its previous content
    pub async fn append_record<T: Serialize>(&self, record: &T) -> OutputResult<usize> {
        let record = serde_json::to_value(record)?;
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        let _guard = self.lock.lock().await;
        let count = tokio::task::spawn_blocking(move || -> OutputResult<usize> {
            let _file_lock = LockFile::acquire(&lock_path, LOCK_WAIT_TIMEOUT)?;

            let mut records = read_records(&path)?;
            records.push(record);
            stage_records(&path, &records)?.commit()?;

            Ok(records.len())
        })
        .await
        .map_err(|e| OutputError::Write(format!("record writer task failed: {}", e)))??;

        tracing::info!("Saved record #{} to {}", count, self.path.display());
        Ok(count)
    }
}

/// Reads the current JSON array
///
/// A missing file is an empty array. Content that does not parse as an array
/// is logged and treated as empty so a corrupt file never blocks new records.
fn read_records(path: &Path) -> OutputResult<Vec<Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<Vec<Value>>(&content) {
        Ok(records) => Ok(records),
        Err(e) => {
            tracing::warn!(
                "Could not parse existing data from {} ({}), starting fresh",
                path.display(),
                e
            );
            Ok(Vec::new())
        }
    }
}

/// A fully written array waiting to replace its target
struct StagedRecords {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedRecords {
    /// Atomically replaces the target with the staged file
    fn commit(self) -> OutputResult<()> {
        self.temp
            .persist(&self.target)
            .map_err(|e| OutputError::Io(e.error))?;
        Ok(())
    }
}

/// Serializes `records` into a temporary file next to `target`
///
/// Dropping the result without committing removes the temporary file and
/// leaves `target` as it was.
fn stage_records(target: &Path, records: &[Value]) -> OutputResult<StagedRecords> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    Ok(StagedRecords {
        temp,
        target: target.to_path_buf(),
    })
}

/// Cross-process lock held by creating a lock file exclusively
///
/// The file is removed when the guard is dropped. A lock file older than
/// `LOCK_STALE_AFTER` is assumed to belong to a writer that crashed and is
/// reclaimed.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: &Path, timeout: Duration) -> OutputResult<Self> {
        let deadline = Instant::now() + timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(path) && Self::reclaim_stale(path) {
                        tracing::warn!("Removed stale lock file {}", path.display());
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(OutputError::LockTimeout(path.display().to_string()));
            }
            std::thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }

    /// Takes a stale lock file out of the way
    ///
    /// The file is first renamed to a unique name so that only one contender
    /// can claim it. If the claimed file turns out to be a fresh lock created
    /// after the staleness check, it is linked back in place.
    fn reclaim_stale(path: &Path) -> bool {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let claimed = match tempfile::Builder::new()
            .prefix(".stale-lock")
            .tempfile_in(dir)
        {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::debug!("Cannot claim stale lock {}: {}", path.display(), e);
                return false;
            }
        };

        if std::fs::rename(path, claimed.path()).is_err() {
            return false;
        }
        if Self::is_stale(claimed.path()) {
            return true;
        }

        if let Err(e) = std::fs::hard_link(claimed.path(), path) {
            tracing::warn!("Could not restore lock file {}: {}", path.display(), e);
        }
        false
    }

    fn is_stale(path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > LOCK_STALE_AFTER)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

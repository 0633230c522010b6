//! Serialized report writer shared by all workers.
//!
//! Each `write_line` appends one complete line and flushes it while holding
//! the sink's own lock, so lines from concurrent workers never interleave.
//! Lines land in completion order, not port order. A write that fails part
//! way is cut back to the last complete line.

use crate::error::{ScanError, ScanResult};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use std::io::SeekFrom;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Counters reported when the sink is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub lines_written: u64,
    pub failed_writes: u64,
}

/// The open report file and the length of its complete lines.
#[derive(Debug)]
struct ReportFile {
    file: File,
    committed: u64,
}

impl ReportFile {
    async fn append(&mut self, record: &[u8]) -> io::Result<()> {
        self.file.write_all(record).await?;
        self.file.flush().await?;
        self.committed += record.len() as u64;
        Ok(())
    }

    /// Drop any bytes past the last complete line.
    async fn rollback(&mut self) -> io::Result<()> {
        self.file.set_len(self.committed).await?;
        self.file.seek(SeekFrom::Start(self.committed)).await?;
        Ok(())
    }
}

/// Append-only, line-atomic report file.
#[derive(Debug)]
pub struct ReportSink {
    path: PathBuf,
    file: Mutex<ReportFile>,
    lines: AtomicU64,
    failures: AtomicU64,
}

impl ReportSink {
    /// Create (or truncate) the report file.
    pub async fn create(path: impl AsRef<Path>) -> ScanResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|source| ScanError::ReportOpen {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "report sink opened");
        Ok(Self {
            path,
            file: Mutex::new(ReportFile { file, committed: 0 }),
            lines: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Location of the report file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` plus a newline and flush before returning.
    ///
    /// On failure the file is truncated back to its previous length, so the
    /// next line never lands on a partial record.
    pub async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let result = {
            let mut file = self.file.lock().await;
            let result = file.append(record.as_bytes()).await;
            if result.is_err() {
                if let Err(e) = file.rollback().await {
                    warn!(path = %self.path.display(), error = %e, "could not discard partial report line");
                }
            }
            result
        };

        match result {
            Ok(()) => {
                self.lines.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Lines successfully written so far.
    pub fn lines_written(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// Flush to disk and close the file.
    ///
    /// Takes the sink by value: callers can only get here once every worker
    /// holding a reference has finished.
    pub async fn close(self) -> io::Result<SinkStats> {
        let mut file = self.file.into_inner().file;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let stats = SinkStats {
            lines_written: self.lines.into_inner(),
            failed_writes: self.failures.into_inner(),
        };
        debug!(path = %self.path.display(), ?stats, "report sink closed");
        Ok(stats)
    }
}

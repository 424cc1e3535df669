//! Append-only audit trail of download attempts.
//!
//! One JSON object per line, synced to disk before `append` returns. The log
//! is opened in append mode and never truncated; eviction and every other
//! component leave it alone.

mod record;

pub use record::{
    AuditOutcome, AuditRecord, FileInfo, REASON_DOWNLOAD_FAILED, REASON_NO_ACCESS,
};

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append cursor over the audit log file. Exclusively owned by the queue
/// worker; nothing else writes to the log.
pub struct AuditLog {
    file: File,
    path: PathBuf,
}

impl AuditLog {
    /// Open the log for appending, creating it if missing. Existing content
    /// is preserved.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open audit log {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line and sync it to disk. Once this
    /// returns, a crash cannot lose the record.
    pub fn append(&mut self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("serialize audit record")?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .with_context(|| format!("append to {}", self.path.display()))?;
        self.file
            .sync_data()
            .with_context(|| format!("sync {}", self.path.display()))?;
        Ok(())
    }

    /// Flush and release the file handle.
    pub fn close(self) -> Result<()> {
        self.file
            .sync_all()
            .with_context(|| format!("close {}", self.path.display()))?;
        Ok(())
    }
}

/// Parse every record in a log file, one per line. Used by tests and
/// external tooling; the service itself never reads the log back.
pub fn read_all(path: &Path) -> Result<Vec<AuditRecord>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord = serde_json::from_str(&line)
            .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

//! Audit record: one self-describing JSON object per download attempt.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Reason code logged when the fetcher failed (any kind).
pub const REASON_DOWNLOAD_FAILED: &str = "download_failed";
/// Reason code logged when a downloaded file could not be stat'ed.
pub const REASON_NO_ACCESS: &str = "no_access";

/// Successful-download payload: root-relative file name and on-disk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

/// Outcome of one attempt. Serializes as `{"error": "..."}` or
/// `{"file": {"name": ..., "size": ...}}` so the log stays parseable by
/// external tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    #[serde(rename = "error")]
    Failure(String),
    #[serde(rename = "file")]
    Success(FileInfo),
}

impl AuditOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuditOutcome::Success(_))
    }
}

/// One append-only log entry capturing the outcome of a single fetch
/// attempt. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    /// Record stamped with the current time.
    pub fn new(id: Uuid, url: String, hash: Option<String>, outcome: AuditOutcome) -> Self {
        Self {
            id,
            url,
            time: OffsetDateTime::now_utc(),
            hash,
            outcome,
        }
    }
}

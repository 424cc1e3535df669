//! Fetcher boundary: retrieve one URL to a local path, or fail.
//!
//! The queue worker drives implementations of [`Fetcher`] synchronously, one
//! request at a time. The default implementation is [`CurlFetcher`]; hosts
//! with their own transport (tests, proxy farms) substitute theirs.

mod http;

pub use http::CurlFetcher;

use crate::checksum::ChecksumAlgorithm;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

/// Everything a fetcher needs for one transfer. Borrowed from the batch
/// config and request; the fetcher keeps nothing.
pub struct FetchJob<'a> {
    pub id: Uuid,
    pub url: &'a Url,
    pub headers: &'a [(String, String)],
    /// curl-style proxy URL, e.g. `http://127.0.0.1:8080`.
    pub proxy: Option<&'a str>,
    pub algorithm: ChecksumAlgorithm,
    /// Expected digest as hex; compared case-insensitively.
    pub expected: Option<&'a str>,
    /// Hard cap on received bytes. A source that is exactly this large
    /// succeeds; one byte more fails with [`FetchError::SizeExceeded`].
    pub max_bytes: u64,
    pub progress: Option<&'a dyn ProgressSink>,
}

/// Optional per-batch progress sink. Called from the worker thread after
/// each received chunk with the total bytes so far for that request.
pub trait ProgressSink: Send + Sync {
    fn bytes_received(&self, id: Uuid, received: u64);
}

/// Why a single transfer failed. The batch coordinator distinguishes these
/// kinds in its log lines but collapses all of them into the failed set.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure (timeout, DNS, connect, TLS).
    #[error("network: {0}")]
    Network(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The source was larger than the batch allows.
    #[error("size limit exceeded: more than {limit} bytes")]
    SizeExceeded { limit: u64 },
    /// Received content hashed to something other than the expected digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    /// Local disk failure while writing the download.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Stable label for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Http(_) => "http",
            FetchError::SizeExceeded { .. } => "size_exceeded",
            FetchError::ChecksumMismatch { .. } => "checksum_mismatch",
            FetchError::Io(_) => "io",
        }
    }
}

/// Retrieves one resource to `dest`, enforcing the job's size cap and
/// checksum. On success the final file exists at the returned path; on
/// failure no partial file is left behind.
pub trait Fetcher: Send {
    fn fetch(&self, dest: &Path, job: &FetchJob<'_>) -> Result<PathBuf, FetchError>;
}

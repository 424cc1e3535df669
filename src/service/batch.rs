//! Batch request, configuration, and result types.

use crate::checksum::ChecksumAlgorithm;
use crate::fetcher::ProgressSink;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// One resource to fetch. The id names both the cache slot and the audit
/// records for this request; immutable once created.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub id: Uuid,
    pub url: Url,
    /// Expected digest as hex, when the caller knows it.
    pub expected: Option<String>,
}

impl FetchRequest {
    /// Request with a fresh random id and no expected checksum.
    pub fn new(url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            expected: None,
        }
    }

    /// Request that must hash to `expected` (hex, case-insensitive).
    pub fn with_checksum(url: Url, expected: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            expected: Some(expected.into()),
        }
    }
}

/// Batch-level settings, immutable for the batch's lifetime.
#[derive(Clone)]
pub struct BatchConfig {
    pub algorithm: ChecksumAlgorithm,
    /// Hard cap on bytes per request; zero is rejected at submission.
    pub max_bytes: u64,
    /// Extra request headers, applied in order.
    pub headers: Vec<(String, String)>,
    /// curl-style proxy URL for every request in the batch.
    pub proxy: Option<String>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl BatchConfig {
    pub fn new(algorithm: ChecksumAlgorithm, max_bytes: u64) -> Self {
        Self {
            algorithm,
            max_bytes,
            headers: Vec::new(),
            proxy: None,
            progress: None,
        }
    }
}

impl std::fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchConfig")
            .field("algorithm", &self.algorithm)
            .field("max_bytes", &self.max_bytes)
            .field("headers", &self.headers)
            .field("proxy", &self.proxy)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Partitioned outcome of a batch: every submitted id lands in exactly one
/// of the two sets. Immutable once returned.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub succeeded: HashMap<Uuid, PathBuf>,
    pub failed: HashSet<Uuid>,
}

impl BatchResult {
    /// True when the partitions are disjoint and cover exactly `ids`.
    pub fn covers<'a>(&self, ids: impl IntoIterator<Item = &'a Uuid>) -> bool {
        let submitted: HashSet<&Uuid> = ids.into_iter().collect();
        let mut seen: HashSet<&Uuid> = HashSet::new();
        for id in self.succeeded.keys() {
            if self.failed.contains(id) || !seen.insert(id) {
                return false;
            }
        }
        for id in &self.failed {
            if !seen.insert(id) {
                return false;
            }
        }
        seen == submitted
    }
}

//! Queue worker: the single thread that owns the cache directory, audit
//! log, and fetcher. All shared-state mutation happens here, which is the
//! whole concurrency story; nothing else needs locks.

use super::batch::{BatchConfig, BatchResult, FetchRequest};
use crate::audit::{AuditLog, AuditOutcome, AuditRecord, FileInfo, REASON_DOWNLOAD_FAILED, REASON_NO_ACCESS};
use crate::cache::{self, CacheDir};
use crate::config::CacheConfig;
use crate::fetcher::{FetchJob, Fetcher};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

/// A unit of work accepted by the queue. Jobs run strictly one at a time in
/// submission order.
pub(super) enum Job {
    Batch {
        config: BatchConfig,
        requests: Vec<FetchRequest>,
        reply: oneshot::Sender<BatchResult>,
    },
    Vacuum {
        reply: oneshot::Sender<usize>,
    },
}

pub(super) struct Worker {
    rx: mpsc::UnboundedReceiver<Job>,
    dir: CacheDir,
    log: AuditLog,
    fetcher: Box<dyn Fetcher>,
    retention: CacheConfig,
}

impl Worker {
    pub(super) fn new(
        rx: mpsc::UnboundedReceiver<Job>,
        dir: CacheDir,
        log: AuditLog,
        fetcher: Box<dyn Fetcher>,
        retention: CacheConfig,
    ) -> Self {
        Self {
            rx,
            dir,
            log,
            fetcher,
            retention,
        }
    }

    /// Drain jobs until every sender is gone, then release the audit log.
    /// Accepted jobs always run to completion; a dropped ticket only means
    /// nobody reads the result.
    pub(super) fn run(mut self) {
        while let Some(job) = self.rx.blocking_recv() {
            match job {
                Job::Batch {
                    config,
                    requests,
                    reply,
                } => {
                    let result = self.run_batch(&config, &requests);
                    let _ = reply.send(result);
                }
                Job::Vacuum { reply } => {
                    let _ = reply.send(self.vacuum());
                }
            }
        }
        if let Err(err) = self.log.close() {
            tracing::error!("failed to close audit log: {:#}", err);
        }
    }

    /// Drive one batch: each request is fetched, partitioned, and logged,
    /// strictly in order. Per-request failures never abort the batch.
    fn run_batch(&mut self, config: &BatchConfig, requests: &[FetchRequest]) -> BatchResult {
        let mut result = BatchResult::default();
        for req in requests {
            let dest = self.dir.resolve(req.id);
            let job = FetchJob {
                id: req.id,
                url: &req.url,
                headers: &config.headers,
                proxy: config.proxy.as_deref(),
                algorithm: config.algorithm,
                expected: req.expected.as_deref(),
                max_bytes: config.max_bytes,
                progress: config.progress.as_deref(),
            };
            let outcome = match self.fetcher.fetch(&dest, &job) {
                Ok(path) => {
                    let outcome = self.file_outcome(&path);
                    result.succeeded.insert(req.id, path);
                    outcome
                }
                Err(err) => {
                    tracing::error!(kind = err.kind(), "failed to download {}: {}", req.url, err);
                    result.failed.insert(req.id);
                    AuditOutcome::Failure(REASON_DOWNLOAD_FAILED.to_string())
                }
            };
            let record = AuditRecord::new(req.id, req.url.to_string(), req.expected.clone(), outcome);
            if let Err(err) = self.log.append(&record) {
                // A logging failure must never fail the batch.
                tracing::error!("failed to log download of {}: {:#}", req.url, err);
            }
        }
        result
    }

    /// Best-effort size query for the audit record. A download whose file
    /// vanished keeps its place in `succeeded`; only the audit outcome
    /// records the degraded observation.
    fn file_outcome(&self, path: &Path) -> AuditOutcome {
        match std::fs::metadata(path) {
            Ok(meta) => AuditOutcome::Success(FileInfo {
                name: self.dir.relativize(path),
                size: meta.len(),
            }),
            Err(err) => {
                tracing::error!("failed to get file size of {}: {}", path.display(), err);
                AuditOutcome::Failure(REASON_NO_ACCESS.to_string())
            }
        }
    }

    fn vacuum(&self) -> usize {
        match cache::vacuum(self.dir.root(), self.retention.max_kept, self.retention.recency) {
            Ok(removed) => removed,
            Err(err) => {
                tracing::error!("cache vacuum failed: {:#}", err);
                0
            }
        }
    }
}

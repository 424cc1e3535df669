//! The fetch service: asynchronous batch submission over a serialized
//! single-worker queue.
//!
//! Callers may submit batches concurrently; at most one job mutates the
//! cache directory or audit log at any instant. Submission never blocks;
//! completion is observed through the returned [`BatchTicket`].

mod batch;
mod worker;

pub use batch::{BatchConfig, BatchResult, FetchRequest};

use crate::audit::AuditLog;
use crate::cache::{self, CacheDir};
use crate::config::CacheConfig;
use crate::fetcher::Fetcher;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use worker::{Job, Worker};

/// Service-level failures. Per-request download errors never surface here;
/// they are partitioned into the batch result and the audit log.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The queue has been closed; no further jobs are accepted.
    #[error("queue is closed")]
    Closed,
    /// The batch configuration is unusable (e.g. a zero byte cap).
    #[error("invalid batch config: {0}")]
    InvalidConfig(String),
    /// The worker thread panicked while draining jobs.
    #[error("queue worker panicked")]
    WorkerPanicked,
}

/// Completion token for a submitted batch.
#[derive(Debug)]
pub struct BatchTicket {
    rx: oneshot::Receiver<BatchResult>,
}

impl BatchTicket {
    /// Await the batch result without blocking the submitter's thread.
    pub async fn wait(self) -> Result<BatchResult, ServiceError> {
        self.rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Blocking variant for synchronous hosts.
    pub fn blocking_wait(self) -> Result<BatchResult, ServiceError> {
        self.rx.blocking_recv().map_err(|_| ServiceError::Closed)
    }
}

/// Downloads batches of URLs into a bounded, checksum-verified disk cache
/// with an append-only audit trail. One instance per cache root; no
/// process-wide state.
pub struct FetchService {
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl FetchService {
    /// Open the service rooted at `root`: create the cache directory, open
    /// the audit log (existing content preserved), bound the cache, then
    /// start the worker. Eviction runs before the queue accepts any job; a
    /// vacuum failure is logged, not fatal.
    pub fn open<F>(root: impl Into<PathBuf>, retention: CacheConfig, fetcher: F) -> Result<Self>
    where
        F: Fetcher + 'static,
    {
        let dir = CacheDir::new(root);
        dir.ensure_root()
            .with_context(|| format!("create cache root {}", dir.root().display()))?;
        let log = AuditLog::open(dir.log_path())?;
        match cache::vacuum(dir.root(), retention.max_kept, retention.recency) {
            Ok(removed) if removed > 0 => {
                tracing::info!("evicted {} cache entries at startup", removed)
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("startup cache vacuum failed: {:#}", err),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker::new(rx, dir, log, Box::new(fetcher), retention);
        let handle = std::thread::Builder::new()
            .name("fetchcache-queue".to_string())
            .spawn(move || worker.run())
            .context("spawn queue worker")?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue a batch and return immediately. The batch runs after every
    /// previously submitted job has finished.
    pub fn submit_batch(
        &self,
        config: BatchConfig,
        requests: Vec<FetchRequest>,
    ) -> Result<BatchTicket, ServiceError> {
        if config.max_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_bytes must be positive".to_string(),
            ));
        }
        let (reply, rx) = oneshot::channel();
        self.send(Job::Batch {
            config,
            requests,
            reply,
        })?;
        Ok(BatchTicket { rx })
    }

    /// Submit a batch and wait for its result.
    pub async fn download_batch(
        &self,
        config: BatchConfig,
        requests: Vec<FetchRequest>,
    ) -> Result<BatchResult, ServiceError> {
        self.submit_batch(config, requests)?.wait().await
    }

    /// Re-run cache eviction, serialized through the queue so it never
    /// races an active batch. Returns the number of entries removed.
    pub async fn vacuum(&self) -> Result<usize, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Job::Vacuum { reply })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Stop accepting jobs, wait for accepted work to drain, and release
    /// the audit log. Idempotent. Blocks the calling thread; run it via
    /// `spawn_blocking` from async code.
    pub fn close(&self) -> Result<(), ServiceError> {
        drop(self.tx.lock().unwrap().take());
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().map_err(|_| ServiceError::WorkerPanicked)?;
        }
        Ok(())
    }

    fn send(&self, job: Job) -> Result<(), ServiceError> {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(ServiceError::Closed)?;
        tx.send(job).map_err(|_| ServiceError::Closed)
    }
}

//! Bounded cache retention: delete all but the most recent entries.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

/// Which filesystem timestamp ranks an entry's recency. Selectable via
/// config; behaviorally significant, so never hard-coded at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecencySignal {
    /// File modification time. Survives reboots, refreshed by re-downloads,
    /// unaffected by `noatime` mounts.
    #[default]
    Modified,
    /// Last access time. Keeps entries that readers still open.
    Accessed,
}

impl RecencySignal {
    fn timestamp(self, meta: &std::fs::Metadata) -> SystemTime {
        let stamp = match self {
            RecencySignal::Modified => meta.modified(),
            RecencySignal::Accessed => meta.accessed(),
        };
        stamp.unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

/// Delete cache entries beyond the `max_kept` most recent, ranked by
/// `signal`. Only files whose name parses as a UUID are considered entries;
/// the audit log and any foreign files are left alone. Per-entry failures
/// are logged and skipped. Returns the number of entries removed.
pub fn vacuum(root: &Path, max_kept: usize, signal: RecencySignal) -> Result<usize> {
    let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
    let dir = std::fs::read_dir(root).with_context(|| format!("list {}", root.display()))?;
    for entry in dir {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("skipping unreadable cache entry: {}", err);
                continue;
            }
        };
        let name = entry.file_name();
        if name.to_str().map(|s| s.parse::<Uuid>().is_ok()) != Some(true) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!("failed to stat {}: {}", entry.path().display(), err);
                continue;
            }
        };
        entries.push((signal.timestamp(&meta), entry.path()));
    }

    // Newest first; path as tie-break so equal timestamps order deterministically.
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut removed = 0usize;
    for (_, path) in entries.iter().skip(max_kept) {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("evicted cache entry {}", path.display());
                removed += 1;
            }
            Err(err) => tracing::warn!("failed to evict {}: {}", path.display(), err),
        }
    }
    Ok(removed)
}

//! Id → path mapping under the cache root.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the audit log inside the cache root.
pub const AUDIT_LOG_NAME: &str = "log.json";

/// Owns the mapping from request id to on-disk path. Directory creation and
/// existence checks go through here; nothing else derives cache paths.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for a request: `root/<hyphenated-uuid>`.
    /// Pure function of root and id; distinct ids never collide.
    pub fn resolve(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Path of the audit log under this root.
    pub fn log_path(&self) -> PathBuf {
        self.root.join(AUDIT_LOG_NAME)
    }

    /// Create the root directory. Safe to call on every startup.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Root-relative rendering of a path, for audit-log readability only.
    /// Falls back to the full path when it is not under the root.
    pub fn relativize(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.display().to_string(),
        }
    }
}

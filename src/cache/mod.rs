//! Cache directory layout and eviction.
//!
//! One file per successfully downloaded request, named by its id, plus the
//! audit log at a fixed path under the same root. Eviction bounds the entry
//! count; it never touches the audit log.

mod dir;
mod evict;

pub use dir::{CacheDir, AUDIT_LOG_NAME};
pub use evict::{vacuum, RecencySignal};

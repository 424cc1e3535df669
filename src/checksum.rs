//! Pluggable checksum algorithms for download verification.
//!
//! The same algorithm labels audit records and verifies downloaded content.
//! Hashing is incremental so the fetcher can verify while streaming instead
//! of re-reading the file afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Checksum algorithm used for a batch. Selected per batch, serializable
/// so hosts can put it in their config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }

    /// Start an incremental hasher for this algorithm.
    pub fn hasher(self) -> ChecksumHasher {
        match self {
            ChecksumAlgorithm::Sha256 => ChecksumHasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => ChecksumHasher::Sha512(Sha512::new()),
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental hasher. `finalize_hex` resets the internal state so the
/// hasher can live inside a curl handler that is only reachable by `&mut`.
pub enum ChecksumHasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl ChecksumHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            ChecksumHasher::Sha256(h) => Digest::update(h, data),
            ChecksumHasher::Sha512(h) => Digest::update(h, data),
        }
    }

    /// Finish the digest and return it as lowercase hex.
    pub fn finalize_hex(&mut self) -> String {
        match self {
            ChecksumHasher::Sha256(h) => hex::encode(h.finalize_reset()),
            ChecksumHasher::Sha512(h) => hex::encode(h.finalize_reset()),
        }
    }
}

/// Compute the checksum of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn hash_path(algo: ChecksumAlgorithm, path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = algo.hasher();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Checksum of an in-memory buffer as lowercase hex.
pub fn hash_bytes(algo: ChecksumAlgorithm, data: &[u8]) -> String {
    let mut hasher = algo.hasher();
    hasher.update(data);
    hasher.finalize_hex()
}

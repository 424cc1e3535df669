//! Default curl-based fetcher.
//!
//! Streams the response into `<dest>.part`, hashing incrementally and
//! enforcing the byte cap inside the write callback, then renames to `dest`
//! once the checksum is verified. Partial files are removed on every failure
//! path.

use super::{FetchError, FetchJob, Fetcher, ProgressSink};
use crate::checksum::ChecksumHasher;
use curl::easy::{Easy2, Handler, List, WriteError};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str;
use std::time::Duration;
use uuid::Uuid;

/// Temporary file suffix used before atomic rename.
const TEMP_SUFFIX: &str = ".part";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const LOW_SPEED_WINDOW: Duration = Duration::from_secs(60);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);
const MAX_REDIRECTS: u32 = 10;

/// HTTP fetcher backed by libcurl. Stateless; one `Easy2` handle per
/// transfer, driven on the calling thread.
#[derive(Debug, Default)]
pub struct CurlFetcher;

impl CurlFetcher {
    pub fn new() -> Self {
        Self
    }

    fn transfer(&self, part: &Path, job: &FetchJob<'_>) -> Result<(), FetchError> {
        let file = File::create(part)?;
        let handler = TransferHandler::new(file, job.id, job.algorithm.hasher(), job.max_bytes, job.progress);
        let mut easy = Easy2::new(handler);
        easy.get(true)?;
        easy.url(job.url.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.connect_timeout(CONNECT_TIMEOUT)?;
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(LOW_SPEED_WINDOW)?;
        easy.timeout(TRANSFER_TIMEOUT)?;
        if let Some(proxy) = job.proxy {
            easy.proxy(proxy)?;
        }
        if !job.headers.is_empty() {
            let mut list = List::new();
            for (k, v) in job.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }

        let outcome = easy.perform();

        // Aborts from inside the write callback surface as a curl write
        // error; the handler flags say what actually happened.
        if easy.get_ref().overflow {
            return Err(FetchError::SizeExceeded { limit: job.max_bytes });
        }
        if let Some(err) = easy.get_mut().io_error.take() {
            return Err(FetchError::Io(err));
        }
        if easy.get_ref().http_error {
            let code = easy.response_code().unwrap_or(0);
            return Err(FetchError::Http(code));
        }
        outcome?;

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }

        let actual = easy.get_mut().hasher.finalize_hex();
        if let Some(expected) = job.expected {
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(FetchError::ChecksumMismatch {
                    expected: expected.to_ascii_lowercase(),
                    actual,
                });
            }
        }
        Ok(())
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, dest: &Path, job: &FetchJob<'_>) -> Result<PathBuf, FetchError> {
        let part = part_path(dest);
        match self.transfer(&part, job) {
            Ok(()) => {
                std::fs::rename(&part, dest)?;
                Ok(dest.to_path_buf())
            }
            Err(err) => {
                let _ = std::fs::remove_file(&part);
                Err(err)
            }
        }
    }
}

/// Path for the in-flight download: appends `.part` to the destination.
fn part_path(dest: &Path) -> PathBuf {
    let mut p = dest.as_os_str().to_owned();
    p.push(TEMP_SUFFIX);
    PathBuf::from(p)
}

/// Handler state for one transfer. Tracks the latest status line and
/// Content-Length from the header callback; the write callback refuses
/// non-2xx bodies and anything past the byte cap by returning `Ok(0)`,
/// which makes libcurl abort the transfer.
struct TransferHandler<'a> {
    file: File,
    hasher: ChecksumHasher,
    received: u64,
    max_bytes: u64,
    status: Option<u32>,
    content_length: Option<u64>,
    overflow: bool,
    http_error: bool,
    io_error: Option<std::io::Error>,
    id: Uuid,
    progress: Option<&'a dyn ProgressSink>,
}

impl<'a> TransferHandler<'a> {
    fn new(
        file: File,
        id: Uuid,
        hasher: ChecksumHasher,
        max_bytes: u64,
        progress: Option<&'a dyn ProgressSink>,
    ) -> Self {
        Self {
            file,
            hasher,
            received: 0,
            max_bytes,
            status: None,
            content_length: None,
            overflow: false,
            http_error: false,
            io_error: None,
            id,
            progress,
        }
    }
}

impl Handler for TransferHandler<'_> {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                // New response block (redirect hop or final): reset per-response state.
                self.status = line.split_whitespace().nth(1).and_then(|c| c.parse().ok());
                self.content_length = None;
            } else if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    self.content_length = value.trim().parse().ok();
                }
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !matches!(self.status, Some(200..=299)) {
            self.http_error = true;
            return Ok(0);
        }
        if self.content_length.map_or(false, |len| len > self.max_bytes) {
            self.overflow = true;
            return Ok(0);
        }
        if self.received + data.len() as u64 > self.max_bytes {
            self.overflow = true;
            return Ok(0);
        }
        match self.file.write_all(data) {
            Ok(()) => {
                self.hasher.update(data);
                self.received += data.len() as u64;
                if let Some(progress) = self.progress {
                    progress.bytes_received(self.id, self.received);
                }
                Ok(data.len())
            }
            Err(err) => {
                tracing::warn!("download write failed: {}", err);
                self.io_error = Some(err);
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{hash_bytes, ChecksumAlgorithm};

    fn handler(dir: &tempfile::TempDir, max_bytes: u64) -> TransferHandler<'static> {
        let file = File::create(dir.path().join("out.part")).unwrap();
        TransferHandler::new(
            file,
            Uuid::new_v4(),
            ChecksumAlgorithm::Sha256.hasher(),
            max_bytes,
            None,
        )
    }

    #[test]
    fn part_path_appends_suffix() {
        let p = part_path(Path::new("/cache/abc"));
        assert_eq!(p.to_string_lossy(), "/cache/abc.part");
    }

    #[test]
    fn write_rejects_non_2xx_with_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(&dir, 1024);
        h.header(b"HTTP/1.1 404 Not Found\r\n");
        let n = h.write(b"not the resource").unwrap();
        assert_eq!(n, 0);
        assert!(h.http_error);
        assert_eq!(h.received, 0);
    }

    #[test]
    fn write_accepts_2xx_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(&dir, 1024);
        h.header(b"HTTP/1.1 200 OK\r\n");
        h.header(b"Content-Length: 12\r\n");
        assert_eq!(h.write(b"cached ").unwrap(), 7);
        assert_eq!(h.write(b"resource body").unwrap(), 13);
        assert_eq!(h.received, 20);
        assert_eq!(
            h.hasher.finalize_hex(),
            hash_bytes(ChecksumAlgorithm::Sha256, b"cached resource body")
        );
    }

    #[test]
    fn write_aborts_once_the_cap_would_be_crossed() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(&dir, 10);
        h.header(b"HTTP/1.1 200 OK\r\n");
        assert_eq!(h.write(b"0123456789").unwrap(), 10, "exactly the cap is fine");
        assert_eq!(h.write(b"x").unwrap(), 0);
        assert!(h.overflow);
        assert_eq!(h.received, 10);
    }

    #[test]
    fn announced_content_length_over_cap_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(&dir, 10);
        h.header(b"HTTP/1.1 200 OK\r\n");
        h.header(b"Content-Length: 1000\r\n");
        assert_eq!(h.write(b"abc").unwrap(), 0);
        assert!(h.overflow);
        assert_eq!(h.received, 0);
    }

    #[test]
    fn redirect_hop_resets_response_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(&dir, 1024);
        h.header(b"HTTP/1.1 302 Found\r\n");
        h.header(b"Content-Length: 999999\r\n");
        h.header(b"HTTP/1.1 200 OK\r\n");
        h.header(b"Content-Length: 4\r\n");
        assert_eq!(h.write(b"data").unwrap(), 4);
        assert!(!h.overflow);
        assert_eq!(h.status, Some(200));
    }
}

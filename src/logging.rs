//! Logging init for host applications: file under the XDG state dir, with
//! graceful fallback to stderr.

use anyhow::Result;
use std::fs;
use std::io;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,fetchcache=debug";

/// Hands out writers backed by one shared log file; a failed handle clone
/// falls back to stderr for that write instead of panicking.
struct SharedLogFile(fs::File);

enum LogWriter {
    File(fs::File),
    Stderr,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for SharedLogFile {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogWriter::File)
            .unwrap_or(LogWriter::Stderr)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize structured logging to `fetchcache.log` under the XDG state
/// dir. Returns Err when the state dir is unusable so the host can call
/// [`init_logging_stderr`] instead.
pub fn init_logging() -> Result<()> {
    let state_dir = xdg::BaseDirectories::with_prefix("fetchcache")?.get_state_home();
    fs::create_dir_all(&state_dir)?;
    let path = state_dir.join("fetchcache.log");
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(SharedLogFile(file))
        .with_ansi(false)
        .init();

    tracing::info!("logging initialized at {}", path.display());
    Ok(())
}

/// Stderr-only initializer, for when `init_logging` fails or a log file is
/// unwanted (tests, containers).
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

//! Logging init: stderr at one level plus a log file at another, with a
//! graceful fallback to stderr only.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_NAME: &str = "seedgate.log";

/// Writer that is either a file or stderr (used when file clone fails).
enum FileOrStderr {
    File(std::fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct FileMakeWriter(std::fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or(FileOrStderr::Stderr)
    }
}

/// Levels and destination for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Stderr level (`RUST_LOG` overrides it).
    pub stderr_level: LevelFilter,
    pub file_level: LevelFilter,
    /// Directory of `seedgate.log`; defaults to `~/.local/state/seedgate`.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            stderr_level: LevelFilter::INFO,
            file_level: LevelFilter::WARN,
            log_dir: None,
        }
    }
}

/// Parse a level name (`trace`..`error`, `off`) as given on the command line.
pub fn parse_level(s: &str) -> Result<LevelFilter> {
    s.trim().parse::<LevelFilter>().map_err(|_| {
        anyhow::anyhow!(
            "invalid log level {:?}, expected trace, debug, info, warn, error or off",
            s
        )
    })
}

/// Default log directory: `~/.local/state/seedgate`.
pub fn default_log_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("seedgate")?;
    Ok(xdg_dirs.get_state_home())
}

fn open_log_file(dir: &Path) -> Result<(fs::File, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

fn stderr_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Initialize logging to stderr and `seedgate.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall back to stderr.
pub fn init_logging(opts: &LogOptions) -> Result<PathBuf> {
    let dir = match &opts.log_dir {
        Some(dir) => dir.clone(),
        None => default_log_dir()?,
    };
    let (file, log_file_path) = open_log_file(&dir)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(stderr_filter(opts.stderr_level));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(FileMakeWriter(file))
        .with_ansi(false)
        .with_filter(opts.file_level);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("seedgate logging initialized at {}", log_file_path.display());

    Ok(log_file_path)
}

/// Initialize logging to stderr only (no file). Use when init_logging() fails so the CLI
/// doesn't crash.
pub fn init_logging_stderr(level: LevelFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(stderr_filter(level))
        .with_writer(io::stderr)
        .try_init();
}

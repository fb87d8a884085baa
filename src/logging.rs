//! Tracing setup and fatal-error reporting
//!
//! Worker modes own stdout (results) and stderr (sync channel), so their
//! tracing output goes to a file or nowhere. Offline commands log to stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    Discard,
}

impl LogTarget {
    /// Target for a worker: the given file, otherwise nothing
    pub fn for_worker(log_file: Option<PathBuf>) -> Self {
        log_file.map(LogTarget::File).unwrap_or(LogTarget::Discard)
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// Fails if the log file cannot be opened. A second call is a no-op.
pub fn init(target: &LogTarget) -> Result<()> {
    let installed = match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        LogTarget::Discard => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(io::sink)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

/// Write the full error chain to `path`, replacing previous content
pub fn write_error_log(path: &Path, err: &anyhow::Error) -> io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{:?}", err)?;
    file.sync_all()
}

/// Report an error that ends the process: error log first, then stderr
pub fn report_fatal(err: &anyhow::Error, error_log: Option<&Path>) {
    tracing::error!("Fatal: {:#}", err);
    if let Some(path) = error_log {
        if let Err(log_err) = write_error_log(path, err) {
            eprintln!("Failed to write error log {:?}: {}", path, log_err);
        }
    }
    eprintln!("Error: {}", crate::protocol::sync_trace(err));
}

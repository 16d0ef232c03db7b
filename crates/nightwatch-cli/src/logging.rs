use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};
use tracing_subscriber::fmt::writer::{EitherWriter, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Appends each event to the night log, reopening the file every time.
///
/// A clobber reset deletes the log mid-run; reopening per event means later
/// events land in the fresh file instead of an unlinked one.
pub struct NightLog {
    path: PathBuf,
    reported: AtomicBool,
}

impl NightLog {
    /// Fails when the log directory cannot be created.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
        }
        Ok(Self {
            path,
            reported: AtomicBool::new(false),
        })
    }
}

impl<'a> MakeWriter<'a> for NightLog {
    type Writer = EitherWriter<File, io::Sink>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => EitherWriter::A(file),
            Err(e) => {
                // The subscriber cannot log its own failure; say it once on stderr.
                if !self.reported.swap(true, Ordering::Relaxed) {
                    eprintln!("Cannot write night log {}: {e}", self.path.display());
                }
                EitherWriter::B(io::sink())
            }
        }
    }
}

/// Console logging at `info` (or `debug` with `--verbose`), plus the night
/// log file when one is given.
pub fn init(verbose: bool, night_log: Option<PathBuf>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::new(level);
    let file_layer = match night_log {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(NightLog::new(path)?),
        ),
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_log_directory_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Panoptes/2013-08-05_Panoptes_IQMon.log");
        let log = NightLog::new(path.clone()).unwrap();
        log.make_writer().write_all(b"line\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "line\n");
    }

    #[test]
    fn test_uncreatable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("Panoptes");
        fs::write(&blocker, b"not a directory").unwrap();
        let err = NightLog::new(blocker.join("night.log")).err().unwrap();
        assert!(err.to_string().contains("Cannot create log directory"));
    }
}

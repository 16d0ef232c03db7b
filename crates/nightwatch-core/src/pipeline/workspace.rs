use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::Result;

/// Scratch directory holding every temporary file of one run.
///
/// Removed by `cleanup`, or on drop if the run bails out first.
#[derive(Debug)]
pub struct WorkingFiles {
    dir: TempDir,
}

impl WorkingFiles {
    pub fn create(tmp_root: &Path, basename: &str) -> Result<Self> {
        fs::create_dir_all(tmp_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{basename}-"))
            .tempdir_in(tmp_root)?;
        debug!(dir = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Number of files currently in the scratch directory.
    pub fn file_count(&self) -> usize {
        fs::read_dir(self.dir.path())
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }

    pub fn cleanup(self) -> Result<()> {
        let count = self.file_count();
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(dir = %path.display(), files = count, "Removed scratch directory");
        Ok(())
    }
}

/// Remove scratch directories left under `tmp_root` for `basename`, as
/// happens when a measurement process is killed before its cleanup.
pub fn sweep_scratch(tmp_root: &Path, basename: &str) -> Result<usize> {
    let prefix = format!("{basename}-");
    let entries = match fs::read_dir(tmp_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) && entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(basename, removed, "Swept leftover scratch directories");
    }
    Ok(removed)
}

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{LayoutConfig, TelescopeConfig};
use crate::error::{NightwatchError, Result};
use crate::layout::AggregatePaths;

use super::report::{Measurements, RowFormatter};

/// The night's log, HTML table and summary file.
///
/// Every append opens the file, writes, and closes it again; nothing is
/// held open between frames.
#[derive(Clone, Debug)]
pub struct AggregateFiles {
    paths: AggregatePaths,
    title: String,
}

impl AggregateFiles {
    pub fn new(layout: &LayoutConfig, telescope: &TelescopeConfig, night: &str) -> Self {
        Self {
            paths: AggregatePaths::new(layout, telescope, night),
            title: format!("{} Results for {night}", telescope.long_name),
        }
    }

    pub fn paths(&self) -> &AggregatePaths {
        &self.paths
    }

    /// Delete whichever of the three files exist. Returns how many were removed.
    pub fn reset(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.paths.all() {
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed aggregate file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(NightwatchError::AggregateWrite {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
        info!(removed, "Clobbered night aggregates");
        Ok(removed)
    }

    /// Append one row to the HTML table and one to the summary file.
    ///
    /// Both files are opened and both rows built before anything is written.
    /// If the summary write fails, the HTML file is cut back to its previous
    /// length so the two never disagree.
    pub fn append(&self, formatter: &RowFormatter, m: &Measurements) -> Result<()> {
        let mut html = PendingAppend::open(
            &self.paths.html,
            || self.html_preamble(formatter),
            &formatter.html_row(m),
        )?;
        let mut summary = PendingAppend::open(
            &self.paths.summary,
            || formatter.summary_header(),
            &formatter.summary_row(m),
        )?;

        html.write()?;
        if let Err(e) = summary.write() {
            if let Err(undo) = html.rollback() {
                warn!(path = %html.path.display(), "Cannot roll back HTML row: {undo}");
            }
            return Err(e);
        }
        debug!(file = %m.file_name, "Rows appended");
        Ok(())
    }

    // The table is never closed: rows are appended for as long as the night
    // lasts and browsers render an unterminated table fine.
    fn html_preamble(&self, formatter: &RowFormatter) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<title>{title}</title>\n\
             <style>\ntable {{ border-collapse: collapse; }}\n\
             td, th {{ border: 1px solid #999; padding: 2px 6px; text-align: center; }}\n\
             td.alert {{ background-color: #FF5A5A; }}\n</style>\n</head>\n<body>\n\
             <h2>{title}</h2>\n<table>\n{header}",
            title = self.title,
            header = formatter.html_header_row(),
        )
    }
}

/// One file opened for append with the text it is about to receive.
struct PendingAppend {
    path: PathBuf,
    file: File,
    len: u64,
    text: String,
}

impl PendingAppend {
    fn open(path: &Path, preamble: impl FnOnce() -> String, line: &str) -> Result<Self> {
        let wrap = |source: io::Error| NightwatchError::AggregateWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(wrap)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(wrap)?;
        let len = file.metadata().map_err(wrap)?.len();
        let mut text = String::new();
        if len == 0 {
            text.push_str(&preamble());
            text.push('\n');
        }
        text.push_str(line);
        text.push('\n');
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            text,
        })
    }

    fn write(&mut self) -> Result<()> {
        self.file
            .write_all(self.text.as_bytes())
            .map_err(|source| NightwatchError::AggregateWrite {
                path: self.path.clone(),
                source,
            })
    }

    fn rollback(&self) -> io::Result<()> {
        self.file.set_len(self.len)
    }
}

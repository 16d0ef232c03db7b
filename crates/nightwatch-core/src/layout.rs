use std::path::{Path, PathBuf};

use crate::config::{LayoutConfig, TelescopeConfig};
use crate::consts::SIDECAR_EXTENSION;
use crate::frame::Frame;

/// Directories of one night under the data root.
#[derive(Clone, Debug, PartialEq)]
pub struct NightLayout {
    pub night: String,
    pub night_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub dark_dir: PathBuf,
}

impl NightLayout {
    pub fn new(layout: &LayoutConfig, night: &str) -> Self {
        Self::for_night_dir(layout, &layout.data_root.join(night))
    }

    /// Layout of the night a frame belongs to, based on where the frame
    /// actually sits rather than on the configured data root.
    pub fn of_frame(layout: &LayoutConfig, frame: &Frame) -> Self {
        Self::for_night_dir(layout, frame.night_dir())
    }

    fn for_night_dir(layout: &LayoutConfig, night_dir: &Path) -> Self {
        let night = night_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            night,
            night_dir: night_dir.to_path_buf(),
            raw_dir: night_dir.join(&layout.raw_dir),
            metadata_dir: night_dir.join(&layout.metadata_dir),
            dark_dir: night_dir.join(&layout.dark_dir),
        }
    }

    /// `<night>/<metadata-dir>/<basename>.info`
    pub fn sidecar_for(&self, basename: &str) -> PathBuf {
        self.metadata_dir
            .join(format!("{basename}.{SIDECAR_EXTENSION}"))
    }
}

/// Night-level files every processed frame appends to.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatePaths {
    pub log: PathBuf,
    pub html: PathBuf,
    pub summary: PathBuf,
}

impl AggregatePaths {
    pub fn new(layout: &LayoutConfig, telescope: &TelescopeConfig, night: &str) -> Self {
        let dir = telescope_logs_dir(layout, telescope);
        let stem = format!("{night}_{}", telescope.name);
        Self {
            log: dir.join(format!("{stem}_IQMonLog.txt")),
            html: dir.join(format!("{stem}.html")),
            summary: dir.join(format!("{stem}_Summary.txt")),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.log, &self.html, &self.summary]
    }
}

pub fn telescope_logs_dir(layout: &LayoutConfig, telescope: &TelescopeConfig) -> PathBuf {
    layout.logs_dir.join(&telescope.long_name)
}

/// Symlink kept pointing at tonight's HTML table.
pub fn tonight_link(layout: &LayoutConfig, telescope: &TelescopeConfig) -> PathBuf {
    telescope_logs_dir(layout, telescope).join(&layout.tonight_link)
}

/// Rendered JPEGs for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct JpegPaths {
    pub full: PathBuf,
    pub crop: PathBuf,
}

impl JpegPaths {
    pub fn new(layout: &LayoutConfig, telescope: &TelescopeConfig, basename: &str) -> Self {
        let dir = layout.plots_dir.join(&telescope.long_name);
        Self {
            full: dir.join(format!("{basename}_full.jpg")),
            crop: dir.join(format!("{basename}_crop.jpg")),
        }
    }
}

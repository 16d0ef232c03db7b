use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_FRAME_DIGITS, DEFAULT_FRAME_EXTENSION, DEFAULT_FRAME_PREFIX};
use crate::error::{NightwatchError, Result};

/// One raw camera exposure.
///
/// Frames live at `<data-root>/<night>/<raw-dir>/<file>`; the night is the
/// name of the directory two levels above the file.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Absolute path of the raw file.
    pub path: PathBuf,
    /// File name without extension, e.g. `IMG0_0001`.
    pub basename: String,
    /// Night identifier, e.g. `2013-08-05`.
    pub night: String,
    pub discovered_at: DateTime<Utc>,
}

impl Frame {
    pub fn from_path(path: &Path, discovered_at: DateTime<Utc>) -> Result<Self> {
        let path = std::path::absolute(path)?;
        let basename = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| NightwatchError::InputNotFound(path.clone()))?
            .to_string();
        let night = night_dir_of(&path)
            .and_then(|dir| dir.file_name())
            .and_then(|s| s.to_str())
            .ok_or_else(|| NightwatchError::InputNotFound(path.clone()))?
            .to_string();
        Ok(Self {
            path,
            basename,
            night,
            discovered_at,
        })
    }

    /// Directory holding everything recorded for this frame's night.
    pub fn night_dir(&self) -> &Path {
        night_dir_of(&self.path).unwrap_or_else(|| Path::new("/"))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.basename.clone())
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

fn night_dir_of(path: &Path) -> Option<&Path> {
    path.parent().and_then(Path::parent)
}

/// Image type recorded in a frame's sidecar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    Object,
    Dark,
    Flat,
    Bias,
    Other(String),
    /// Sidecar missing, unreadable, or lacking the tag.
    Unknown,
}

impl FrameType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "" => Self::Unknown,
            "OBJECT" => Self::Object,
            "DARK" => Self::Dark,
            "FLAT" => Self::Flat,
            "BIAS" => Self::Bias,
            other => Self::Other(other.to_string()),
        }
    }

    /// Only science exposures are measured.
    pub fn qualifies(&self) -> bool {
        matches!(self, Self::Object)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "OBJECT"),
            Self::Dark => write!(f, "DARK"),
            Self::Flat => write!(f, "FLAT"),
            Self::Bias => write!(f, "BIAS"),
            Self::Other(tag) => write!(f, "{tag}"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Naming pattern of raw frames: prefix, fixed-width index, extension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FramePattern {
    pub prefix: String,
    pub digits: usize,
    pub extension: String,
}

impl Default for FramePattern {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_FRAME_PREFIX.into(),
            digits: DEFAULT_FRAME_DIGITS,
            extension: DEFAULT_FRAME_EXTENSION.into(),
        }
    }
}

impl FramePattern {
    /// Embedded frame index, or `None` if `name` does not follow the pattern.
    pub fn frame_index(&self, name: &str) -> Option<u32> {
        let rest = name.strip_prefix(self.prefix.as_str())?;
        let (digits, ext) = rest.split_once('.')?;
        if ext != self.extension
            || digits.len() != self.digits
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        digits.parse().ok()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.frame_index(name).is_some()
    }

    /// Keep matching names, ordered by embedded index.
    pub fn sort_frames<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut indexed: Vec<(u32, String)> = names
            .into_iter()
            .filter_map(|n| {
                let n = n.as_ref();
                self.frame_index(n).map(|i| (i, n.to_string()))
            })
            .collect();
        indexed.sort();
        indexed.into_iter().map(|(_, n)| n).collect()
    }
}

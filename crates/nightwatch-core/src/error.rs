use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NightwatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Metadata file not available: {}", .0.display())]
    MetadataUnavailable(PathBuf),

    #[error("Cannot start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {output}")]
    ExternalTool {
        tool: String,
        status: String,
        output: String,
    },

    #[error("{tool} timed out after {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("Cannot append to {}: {source}", path.display())]
    AggregateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Invalid source catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl NightwatchError {
    /// External tool could not start, exited non-zero or ran past its timeout.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::ExternalTool { .. } | Self::ToolTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, NightwatchError>;

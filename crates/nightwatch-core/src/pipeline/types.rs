use std::path::PathBuf;
use std::time::Duration;

use super::report::Measurements;

/// Per-frame pipeline stage, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Acquire,
    MergeMetadata,
    Solve,
    PointingError,
    DarkSubtract,
    Crop,
    ExtractSources,
    Statistics,
    Render,
    Cleanup,
    Timing,
    EmitRows,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquire => write!(f, "Acquiring working copy"),
            Self::MergeMetadata => write!(f, "Merging metadata"),
            Self::Solve => write!(f, "Solving astrometry"),
            Self::PointingError => write!(f, "Measuring pointing error"),
            Self::DarkSubtract => write!(f, "Subtracting dark"),
            Self::Crop => write!(f, "Cropping"),
            Self::ExtractSources => write!(f, "Extracting sources"),
            Self::Statistics => write!(f, "Computing statistics"),
            Self::Render => write!(f, "Rendering JPEG"),
            Self::Cleanup => write!(f, "Cleaning up"),
            Self::Timing => write!(f, "Timing"),
            Self::EmitRows => write!(f, "Writing results"),
        }
    }
}

/// A stage that failed without ending the run.
#[derive(Clone, Debug, PartialEq)]
pub struct StageIssue {
    pub stage: PipelineStage,
    pub message: String,
}

/// Outcome of one dispatched frame that reached the row-writing stage.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub basename: String,
    pub night: String,
    pub measurements: Measurements,
    /// Degraded stages, in order.
    pub issues: Vec<StageIssue>,
    pub jpegs: Vec<PathBuf>,
    pub elapsed: Duration,
    /// Whether the aggregate files were reset before this frame.
    pub clobbered: bool,
}

/// Options the caller sets per dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Reset the night's aggregate files before appending. Batch and
    /// monitor callers set this on the first frame of a run only.
    pub clobber: bool,
}

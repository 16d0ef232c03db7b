//! Per-frame measurement pipeline and the night-level files it feeds.

mod aggregate;
pub mod conditions;
mod dispatcher;
mod report;
mod stats;
mod types;
mod workspace;

pub use aggregate::AggregateFiles;
pub use dispatcher::{dispatch_frame, find_darks};
pub use report::{Measurements, RowField, RowFormatter, Thresholds};
pub use stats::SourceStats;
pub use types::{DispatchOptions, FrameReport, PipelineStage, StageIssue};
pub use workspace::{sweep_scratch, WorkingFiles};

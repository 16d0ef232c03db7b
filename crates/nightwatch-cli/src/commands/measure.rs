use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use nightwatch_core::config::NightwatchConfig;
use nightwatch_core::frame::Frame;
use nightwatch_core::layout::AggregatePaths;
use nightwatch_core::pipeline::{dispatch_frame, DispatchOptions};
use nightwatch_core::processor::ToolchainProcessor;
use tracing::warn;

use super::Context;
use crate::summary;

#[derive(Args)]
pub struct MeasureArgs {
    /// Raw (.CR2) or FITS frame inside a night directory
    pub frame: PathBuf,

    /// Reset the night's log, HTML table and summary before writing
    #[arg(long)]
    pub clobber: bool,
}

/// Night log the frame's events are appended to, if the frame path names a
/// night at all.
pub fn night_log(args: &MeasureArgs, config: &NightwatchConfig) -> Option<PathBuf> {
    let frame = Frame::from_path(&args.frame, Utc::now()).ok()?;
    Some(AggregatePaths::new(&config.layout, &config.telescope, &frame.night).log)
}

pub fn run(args: &MeasureArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let frame = Frame::from_path(&args.frame, Utc::now())
        .with_context(|| format!("Cannot locate night of {}", args.frame.display()))?;
    let processor = ToolchainProcessor::new(config.tools.clone());

    let options = DispatchOptions {
        clobber: args.clobber,
    };
    let report = dispatch_frame(&frame, config, &processor, options)
        .with_context(|| format!("Failed to measure {}", frame.file_name()))?;

    if !report.issues.is_empty() {
        warn!(frame = %frame.file_name(), degraded = report.issues.len(), "Measured with degraded stages");
    }
    summary::print_frame_report(&report, &config.output.unavailable_marker);
    Ok(())
}

//! Offline replay of one night: classify every frame already on disk and
//! dispatch the object frames in frame-number order.

use std::fs;

use chrono::Utc;
use tracing::{info, warn};

use crate::classify::classify_frame;
use crate::config::NightwatchConfig;
use crate::error::{NightwatchError, Result};
use crate::frame::{Frame, FrameType};
use crate::layout::NightLayout;
use crate::monitor::{DispatchOutcome, FrameRunner};

/// Progress hooks for the batch driver. All methods default to no-ops.
pub trait BatchProgress {
    /// `total` frames matched the naming pattern.
    fn begin(&self, _total: usize) {}

    /// One frame was handled; `outcome` is `None` when it was skipped.
    fn frame_done(&self, _name: &str, _outcome: Option<&DispatchOutcome>) {}

    fn finish(&self) {}
}

/// Silent progress, for callers that only want the summary.
pub struct NoProgress;
impl BatchProgress for NoProgress {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NightSummary {
    pub frames: usize,
    /// Basenames in the order they were dispatched.
    pub dispatched: Vec<String>,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl NightSummary {
    pub fn succeeded(&self) -> usize {
        self.dispatched.len() - self.failed - self.timed_out
    }
}

/// Frames of `night` that follow the naming pattern, by embedded index.
pub fn list_night_frames(config: &NightwatchConfig, night: &str) -> Result<Vec<Frame>> {
    let layout = NightLayout::new(&config.layout, night);
    if !layout.raw_dir.is_dir() {
        return Err(NightwatchError::InputNotFound(layout.raw_dir));
    }
    let names: Vec<String> = fs::read_dir(&layout.raw_dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    let now = Utc::now();
    config
        .layout
        .frames
        .sort_frames(names)
        .into_iter()
        .map(|name| Frame::from_path(&layout.raw_dir.join(name), now))
        .collect()
}

/// Classify and dispatch a whole night.
///
/// `clobber` rides on the first dispatched frame only. Individual frame
/// failures are counted, never returned.
pub fn run_night(
    config: &NightwatchConfig,
    night: &str,
    clobber: bool,
    runner: &mut dyn FrameRunner,
    progress: &dyn BatchProgress,
) -> Result<NightSummary> {
    let frames = list_night_frames(config, night)?;
    info!(night, frames = frames.len(), clobber, "Processing night");
    progress.begin(frames.len());

    let mut summary = NightSummary {
        frames: frames.len(),
        ..Default::default()
    };
    let mut clobber_pending = clobber;
    for frame in &frames {
        let frame_type = classify_frame(config, frame);
        if !frame_type.qualifies() {
            match frame_type {
                FrameType::Unknown => warn!(frame = %frame.file_name(), "No image type; skipping"),
                other => info!(frame = %frame.file_name(), image_type = %other, "Skipping"),
            }
            summary.skipped += 1;
            progress.frame_done(&frame.basename, None);
            continue;
        }

        let outcome = runner.run(frame, clobber_pending);
        clobber_pending = false;
        outcome.log(frame);
        match outcome {
            DispatchOutcome::Succeeded => {}
            DispatchOutcome::Failed(_) => summary.failed += 1,
            DispatchOutcome::TimedOut => summary.timed_out += 1,
        }
        summary.dispatched.push(frame.basename.clone());
        progress.frame_done(&frame.basename, Some(&outcome));
    }

    progress.finish();
    info!(
        night,
        dispatched = summary.dispatched.len(),
        skipped = summary.skipped,
        failed = summary.failed + summary.timed_out,
        "Night complete"
    );
    Ok(summary)
}

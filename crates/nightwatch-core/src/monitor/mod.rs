//! Near-real-time watcher over one night's raw-frame directory.
//!
//! Polls by full listing and set difference. Frames are classified and
//! dispatched strictly one after another in discovery order; pre-existing
//! frames are snapshotted at start and never dispatched.

mod runner;
mod tonight;

use std::collections::BTreeSet;
use std::fmt;
use std::fs;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::classify::classify_with_retry;
use crate::clock::Clock;
use crate::config::NightwatchConfig;
use crate::error::Result;
use crate::frame::{Frame, FrameType};
use crate::layout::{tonight_link, AggregatePaths, NightLayout};

pub use runner::{DispatchOutcome, FrameRunner, InProcessRunner, SubprocessRunner};
pub use tonight::{update_link, LinkUpdate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Classifying,
    Dispatching,
    /// Cutoff passed; the loop has exited.
    Finished,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Classifying => write!(f, "classifying"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Running totals over the monitor's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub ticks: usize,
    pub new_frames: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl MonitorSummary {
    pub fn dispatched(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }

    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Succeeded => self.succeeded += 1,
            DispatchOutcome::Failed(_) => self.failed += 1,
            DispatchOutcome::TimedOut => self.timed_out += 1,
        }
    }
}

/// First `cutoff_hour:00` local time strictly after `start`.
///
/// A cutoff falling in a DST gap moves to the next representable hour.
pub fn end_of_night<Tz: TimeZone>(start: &DateTime<Tz>, cutoff_hour: u32) -> DateTime<Tz> {
    let tz = start.timezone();
    let local = start.naive_local();
    let mut candidate: NaiveDateTime = local
        .date()
        .and_hms_opt(cutoff_hour.min(23), 0, 0)
        .unwrap_or(local);
    if candidate <= local {
        candidate += ChronoDuration::days(1);
    }
    for _ in 0..3 {
        if let Some(end) = tz.from_local_datetime(&candidate).earliest() {
            return end;
        }
        candidate += ChronoDuration::hours(1);
    }
    start.clone() + ChronoDuration::days(1)
}

/// The directory monitor for one night.
pub struct Monitor<'a> {
    config: &'a NightwatchConfig,
    layout: NightLayout,
    runner: &'a mut dyn FrameRunner,
    clock: &'a dyn Clock,
    previous: BTreeSet<String>,
    state: MonitorState,
    deadline: DateTime<Utc>,
    clobber_pending: bool,
    summary: MonitorSummary,
}

impl<'a> Monitor<'a> {
    /// Prepare the night's directories and snapshot what is already there.
    pub fn new(
        config: &'a NightwatchConfig,
        night: &str,
        runner: &'a mut dyn FrameRunner,
        clock: &'a dyn Clock,
        clobber: bool,
    ) -> Result<Self> {
        let layout = NightLayout::new(&config.layout, night);
        fs::create_dir_all(&layout.raw_dir)?;
        let deadline = end_of_night(&clock.now().with_timezone(&Local), config.monitor.cutoff_hour)
            .with_timezone(&Utc);

        let mut monitor = Self {
            config,
            layout,
            runner,
            clock,
            previous: BTreeSet::new(),
            state: MonitorState::Idle,
            deadline,
            clobber_pending: clobber,
            summary: MonitorSummary::default(),
        };
        monitor.previous = monitor.list()?;
        info!(
            dir = %monitor.layout.raw_dir.display(),
            existing = monitor.previous.len(),
            until = %deadline.with_timezone(&Local).format("%Y-%m-%d %H:%M %Z"),
            "Monitoring"
        );
        Ok(monitor)
    }

    /// Replace the end-of-night deadline computed from the cutoff hour.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn summary(&self) -> &MonitorSummary {
        &self.summary
    }

    fn list(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.layout.raw_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    /// One poll: diff the listing and handle each new frame in order.
    ///
    /// Returns how many new frames were seen.
    pub fn tick(&mut self) -> Result<usize> {
        self.summary.ticks += 1;
        let current = match self.list() {
            Ok(names) => names,
            Err(e) => {
                warn!(dir = %self.layout.raw_dir.display(), "Cannot list directory: {e}");
                return Ok(0);
            }
        };
        let pattern = &self.config.layout.frames;
        let fresh = pattern.sort_frames(current.difference(&self.previous));
        if !fresh.is_empty() {
            debug!(count = fresh.len(), "New frames");
            self.clock.sleep(self.config.monitor.settle_interval());
        }

        // Each frame counts as seen before it is handled, so nothing that
        // happens while handling it can bring it back next tick.
        for name in &fresh {
            self.summary.new_frames += 1;
            self.previous.insert(name.clone());
            self.handle(name);
        }

        self.previous = current;
        self.refresh_tonight_link();
        Ok(fresh.len())
    }

    fn handle(&mut self, name: &str) {
        let frame = match Frame::from_path(&self.layout.raw_dir.join(name), self.clock.now()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(frame = %name, "Cannot resolve frame; skipping: {e}");
                self.summary.skipped += 1;
                return;
            }
        };

        self.state = MonitorState::Classifying;
        let policy = self.config.monitor.retry_policy();
        let frame_type = classify_with_retry(self.config, &frame, &policy, self.clock);

        if frame_type.qualifies() {
            self.state = MonitorState::Dispatching;
            info!(frame = %name, "Dispatching");
            let outcome = self.runner.run(&frame, self.clobber_pending);
            self.clobber_pending = false;
            outcome.log(&frame);
            self.summary.record(&outcome);
        } else {
            match frame_type {
                FrameType::Unknown => warn!(frame = %name, "No image type; skipping"),
                other => info!(frame = %name, image_type = %other, "Not an object frame; skipping"),
            }
            self.summary.skipped += 1;
        }
        self.state = MonitorState::Idle;
    }

    fn refresh_tonight_link(&self) {
        let config = self.config;
        let target = AggregatePaths::new(&config.layout, &config.telescope, &self.layout.night).html;
        let link = tonight_link(&config.layout, &config.telescope);
        if let Err(e) = update_link(&link, &target) {
            warn!(link = %link.display(), "Cannot update tonight link: {e}");
        }
    }

    /// Poll until the deadline passes.
    pub fn run(&mut self) -> Result<MonitorSummary> {
        while self.clock.now() < self.deadline {
            if let Err(e) = self.tick() {
                warn!("Poll failed: {e}");
            }
            self.clock.sleep(self.config.monitor.poll_interval());
        }
        self.state = MonitorState::Finished;
        info!(
            dispatched = self.summary.dispatched(),
            skipped = self.summary.skipped,
            "End of night reached"
        );
        Ok(self.summary.clone())
    }
}

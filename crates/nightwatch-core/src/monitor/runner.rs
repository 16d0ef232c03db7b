use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::NightwatchConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::pipeline::{dispatch_frame, sweep_scratch, DispatchOptions};
use crate::process::{run_bounded, ProcessOutcome};
use crate::processor::ImageProcessor;

/// How one frame's dispatch ended, as seen by the monitor or batch driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Log the outcome with a level matching its severity.
    pub fn log(&self, frame: &Frame) {
        match self {
            Self::Succeeded => info!(frame = %frame.file_name(), "Dispatch succeeded"),
            Self::Failed(reason) => error!(frame = %frame.file_name(), %reason, "Dispatch failed"),
            Self::TimedOut => error!(frame = %frame.file_name(), "Dispatch timed out"),
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Runs the pipeline dispatcher for one frame, isolated from the caller.
///
/// Implementations never return an error: every failure becomes an outcome
/// so one bad frame cannot stop a night.
pub trait FrameRunner {
    fn run(&mut self, frame: &Frame, clobber: bool) -> DispatchOutcome;
}

/// Runs `<program> [args..] measure <frame> [--clobber]` with a timeout.
///
/// A timed-out measurement is killed with its tools; its scratch
/// directory is then removed here when a scratch root is known.
#[derive(Clone, Debug)]
pub struct SubprocessRunner {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl SubprocessRunner {
    pub fn new(program: PathBuf, args: Vec<OsString>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
            scratch_root: None,
        }
    }

    pub fn with_scratch_root(mut self, tmp_root: PathBuf) -> Self {
        self.scratch_root = Some(tmp_root);
        self
    }

    fn sweep(&self, frame: &Frame) {
        let Some(ref root) = self.scratch_root else {
            return;
        };
        if let Err(e) = sweep_scratch(root, &frame.basename) {
            warn!(frame = %frame.file_name(), "Cannot remove scratch of timed-out run: {e}");
        }
    }

    /// Re-invoke the running executable, forwarding the config file and
    /// verbosity.
    pub fn current_exe(config_file: Option<&Path>, verbose: bool, timeout: Duration) -> Result<Self> {
        let program = std::env::current_exe()?;
        let mut args = Vec::new();
        if let Some(path) = config_file {
            args.push(OsString::from("--config"));
            args.push(path.as_os_str().to_owned());
        }
        if verbose {
            args.push(OsString::from("--verbose"));
        }
        Ok(Self::new(program, args, timeout))
    }

    pub fn command_for(&self, frame: &Frame, clobber: bool) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg("measure").arg(&frame.path);
        if clobber {
            command.arg("--clobber");
        }
        command
    }
}

impl FrameRunner for SubprocessRunner {
    fn run(&mut self, frame: &Frame, clobber: bool) -> DispatchOutcome {
        let command = self.command_for(frame, clobber);
        match run_bounded(command, self.timeout, None) {
            Ok(captured) => match captured.outcome {
                ProcessOutcome::Exited(status) if status.success() => DispatchOutcome::Succeeded,
                ProcessOutcome::Exited(status) => {
                    let last_line = captured.output.lines().last().unwrap_or_default().to_string();
                    DispatchOutcome::Failed(format!("{status}: {last_line}"))
                }
                ProcessOutcome::TimedOut => {
                    self.sweep(frame);
                    DispatchOutcome::TimedOut
                }
            },
            Err(e) => {
                warn!(program = %self.program.display(), "Cannot start measurement: {e}");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Calls the dispatcher directly in this process.
pub struct InProcessRunner<'a> {
    config: &'a NightwatchConfig,
    processor: &'a dyn ImageProcessor,
}

impl<'a> InProcessRunner<'a> {
    pub fn new(config: &'a NightwatchConfig, processor: &'a dyn ImageProcessor) -> Self {
        Self { config, processor }
    }
}

impl FrameRunner for InProcessRunner<'_> {
    fn run(&mut self, frame: &Frame, clobber: bool) -> DispatchOutcome {
        match dispatch_frame(frame, self.config, self.processor, DispatchOptions { clobber }) {
            Ok(_) => DispatchOutcome::Succeeded,
            Err(e) => DispatchOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use chrono::Utc;

    use super::*;

    fn frame(dir: &Path) -> Frame {
        let raw = dir.join("2013-08-05/CR2/IMG0_0001.CR2");
        Frame::from_path(&raw, Utc::now()).unwrap()
    }

    fn sh(script: &str, timeout: Duration) -> SubprocessRunner {
        SubprocessRunner::new("sh".into(), vec!["-c".into(), script.into(), "sh".into()], timeout)
    }

    #[test]
    fn test_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SubprocessRunner::new(
            "/usr/bin/nightwatch".into(),
            vec!["--config".into(), "/etc/nw.toml".into()],
            Duration::from_secs(1),
        );
        let f = frame(dir.path());
        let cmd = runner.command_for(&f, true);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[..3], ["--config", "/etc/nw.toml", "measure"]);
        assert!(args[3].ends_with("IMG0_0001.CR2"));
        assert_eq!(args[4], "--clobber");
        assert_eq!(runner.command_for(&f, false).get_args().count(), 4);
    }

    #[test]
    fn test_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let f = frame(dir.path());
        let ok = sh("exit 0", Duration::from_secs(10)).run(&f, false);
        assert_eq!(ok, DispatchOutcome::Succeeded);
        let failed = sh("echo broken >&2; exit 2", Duration::from_secs(10)).run(&f, false);
        assert!(matches!(failed, DispatchOutcome::Failed(ref r) if r.contains("broken")));
        let slow = sh("sleep 30", Duration::from_secs(1)).run(&f, false);
        assert_eq!(slow, DispatchOutcome::TimedOut);
    }

    #[test]
    fn test_timeout_removes_scratch_of_killed_run() {
        let dir = tempfile::tempdir().unwrap();
        let f = frame(dir.path());
        let tmp = dir.path().join("tmp");
        let script = "mkdir -p \"$1/IMG0_0001-run\" && touch \"$1/IMG0_0001-run/IMG0_0001.fits\" && sleep 30";
        let mut runner = SubprocessRunner::new(
            "sh".into(),
            vec!["-c".into(), script.into(), "sh".into(), tmp.clone().into()],
            Duration::from_secs(1),
        )
        .with_scratch_root(tmp.clone());

        assert_eq!(runner.run(&f, false), DispatchOutcome::TimedOut);
        assert!(tmp.exists());
        assert!(!tmp.join("IMG0_0001-run").exists());
    }
}

use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ToolConfig;
#[cfg(unix)]
use crate::consts::TERMINATE_GRACE_MS;
use crate::consts::TOOL_POLL_INTERVAL_MS;
use crate::error::{NightwatchError, Result};

/// Captured output kept for error messages.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// How a bounded subprocess ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited(ExitStatus),
    /// Killed after running past its timeout.
    TimedOut,
}

#[derive(Debug)]
pub struct Captured {
    pub outcome: ProcessOutcome,
    /// Tail of stderr (and stdout, unless redirected).
    pub output: String,
}

/// Run `command` to completion or until `timeout`, whichever comes first.
///
/// Output goes to an anonymous temp file rather than a pipe so a chatty
/// child can never block on a full pipe buffer. When `stdout_to` is given,
/// stdout is written there instead.
///
/// On unix the child leads its own process group; a timeout terminates the
/// whole group, so tools started by the child do not outlive it.
pub fn run_bounded(
    mut command: Command,
    timeout: Duration,
    stdout_to: Option<&Path>,
) -> Result<Captured> {
    let mut log = tempfile::tempfile()?;
    let stdout = match stdout_to {
        Some(path) => Stdio::from(File::create(path)?),
        None => Stdio::from(log.try_clone()?),
    };
    command
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::from(log.try_clone()?));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    debug!(command = ?command, ?timeout, "Spawning");
    let mut child = command.spawn().map_err(|source| NightwatchError::Spawn {
        program: command.get_program().into(),
        source,
    })?;
    let start = Instant::now();
    let outcome = loop {
        if let Some(status) = child.try_wait()? {
            break ProcessOutcome::Exited(status);
        }
        if start.elapsed() >= timeout {
            terminate(&mut child)?;
            break ProcessOutcome::TimedOut;
        }
        std::thread::sleep(Duration::from_millis(TOOL_POLL_INTERVAL_MS));
    };

    log.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    log.read_to_end(&mut bytes)?;
    Ok(Captured {
        outcome,
        output: tail(&String::from_utf8_lossy(&bytes)),
    })
}

/// SIGTERM the child's group, allow a grace period, then SIGKILL whatever
/// is left of it.
#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<()> {
    let group = child.id() as libc::pid_t;
    signal_group(group, libc::SIGTERM);
    let deadline = Instant::now() + Duration::from_millis(TERMINATE_GRACE_MS);
    while child.try_wait()?.is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(TOOL_POLL_INTERVAL_MS));
    }
    // Descendants may outlive the group leader.
    signal_group(group, libc::SIGKILL);
    child.wait()?;
    Ok(())
}

#[cfg(unix)]
fn signal_group(group: libc::pid_t, signal: libc::c_int) {
    if unsafe { libc::killpg(group, signal) } == 0 {
        return;
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::ESRCH) {
        warn!(group, signal, "Cannot signal process group: {err}");
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<()> {
    if let Err(e) = child.kill() {
        warn!("Failed to kill timed-out process: {e}");
    }
    child.wait()?;
    Ok(())
}

fn tail(text: &str) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - OUTPUT_TAIL_CHARS).collect()
}

/// Run an external tool, turning a failed start, a non-zero exit or a
/// timeout into a tool failure.
pub fn run_tool<I, S>(
    tool: &ToolConfig,
    args: I,
    cwd: Option<&Path>,
    stdout_to: Option<&Path>,
) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(&tool.program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let captured = match run_bounded(command, tool.timeout(), stdout_to) {
        Err(NightwatchError::Spawn { source, .. }) => {
            return Err(NightwatchError::ExternalTool {
                tool: tool.name(),
                status: "not started".into(),
                output: source.to_string(),
            })
        }
        other => other?,
    };
    match captured.outcome {
        ProcessOutcome::Exited(status) if status.success() => Ok(captured.output),
        ProcessOutcome::Exited(status) => Err(NightwatchError::ExternalTool {
            tool: tool.name(),
            status: status.to_string(),
            output: captured.output,
        }),
        ProcessOutcome::TimedOut => Err(NightwatchError::ToolTimeout {
            tool: tool.name(),
            timeout: tool.timeout(),
        }),
    }
}

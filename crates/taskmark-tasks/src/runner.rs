//! External process execution for a single script
//!
//! A [`ScriptRunner`] prepares the process (interpreter, arguments,
//! environment, working directory) and a [`RunningScript`] waits for it,
//! running the graceful termination sequence when the run is cancelled:
//! interrupt, wait out the grace period, then kill. On unix each script
//! leads its own process group so signals reach everything it started.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use taskmark_core::Script;

/// Exit code reported when no real exit code is available
pub const SYNTHETIC_FAILURE: i32 = -1;

/// Default time between interrupt and kill
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Errors while running a script
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for process: {0}")]
    Wait(#[source] io::Error),

    #[error("Script cancelled before it started")]
    Cancelled,
}

/// Builder for a script process
#[derive(Debug)]
pub struct ScriptRunner {
    command: Command,
    program: String,
    stdin_body: Option<String>,
    grace_period: Duration,
}

impl ScriptRunner {
    /// Prepare `script` for execution with piped output
    pub fn new(script: &Script) -> Self {
        let mut command = Command::new(&script.exec_path);
        command
            .args(script.command_args())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let stdin_body = if script.uses_stdin() {
            command.stdin(Stdio::piped());
            Some(script.body.clone())
        } else {
            command.stdin(Stdio::null());
            None
        };

        Self {
            command,
            program: script.exec_path.display().to_string(),
            stdin_body,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Working directory of the process
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.current_dir(dir);
        self
    }

    /// Variables added on top of the inherited process environment
    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.command.envs(env);
        self
    }

    /// Time between interrupt and kill on cancellation
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Start the process
    pub fn spawn(mut self) -> Result<RunningScript, RunnerError> {
        let mut child = self.command.spawn().map_err(|source| RunnerError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        debug!(program = %self.program, pid = ?child.id(), "spawned script");

        let stdin_writer = match (self.stdin_body, child.stdin.take()) {
            (Some(body), Some(mut stdin)) => Some(tokio::spawn(async move {
                stdin.write_all(body.as_bytes()).await?;
                stdin.shutdown().await
            })),
            _ => None,
        };

        let group = ProcessGroup {
            pgid: child.id(),
            grace_period: self.grace_period,
        };
        Ok(RunningScript {
            child,
            group,
            stdin_writer,
        })
    }
}

/// A started script process
#[derive(Debug)]
pub struct RunningScript {
    child: Child,
    group: ProcessGroup,
    stdin_writer: Option<JoinHandle<io::Result<()>>>,
}

impl RunningScript {
    /// OS process id, while the process is running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The process group the script leads, usable after the script exits
    pub fn group(&self) -> ProcessGroup {
        self.group
    }

    /// Take the process's standard output
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the process's standard error
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// When `cancel` fires first the process is interrupted, given the grace
    /// period to exit, and killed if it is still running.
    pub async fn wait(mut self, cancel: &CancellationToken) -> Result<i32, RunnerError> {
        let status = tokio::select! {
            status = self.child.wait() => status.map_err(RunnerError::Wait)?,
            _ = cancel.cancelled() => self.terminate().await?,
        };
        self.finish_stdin().await;
        Ok(normalize_exit(status))
    }

    async fn terminate(&mut self) -> Result<ExitStatus, RunnerError> {
        debug!(pid = ?self.child.id(), "cancellation requested, interrupting script");
        if self.group.signal(Signal::Interrupt) {
            match tokio::time::timeout(self.group.grace_period, self.child.wait()).await {
                Ok(status) => return status.map_err(RunnerError::Wait),
                Err(_) => warn!(
                    pid = ?self.child.id(),
                    grace_secs = self.group.grace_period.as_secs_f64(),
                    "script ignored interrupt, killing"
                ),
            }
        }
        if !self.group.signal(Signal::Kill) {
            self.child.start_kill().map_err(RunnerError::Wait)?;
        }
        self.child.wait().await.map_err(RunnerError::Wait)
    }

    async fn finish_stdin(&mut self) {
        let Some(writer) = self.stdin_writer.take() else {
            return;
        };
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => debug!("failed to write script body to stdin: {}", e),
            Err(e) => debug!("stdin writer task failed: {}", e),
        }
    }
}

/// The process group a script leads.
///
/// Processes the script started in the background stay in the group after
/// the script itself has exited, and may keep its output pipes open.
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroup {
    pgid: Option<u32>,
    grace_period: Duration,
}

impl ProcessGroup {
    /// Whether any process of the group is still alive
    pub fn is_alive(&self) -> bool {
        self.signal(Signal::Probe)
    }

    /// Interrupt what is left of the group and kill it once the grace
    /// period runs out
    pub async fn terminate(&self) {
        if !self.signal(Signal::Interrupt) {
            return;
        }
        debug!(pgid = ?self.pgid, "interrupting remaining processes of script");
        let deadline = Instant::now() + self.grace_period;
        while self.is_alive() && Instant::now() < deadline {
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
        if self.is_alive() {
            warn!(
                pgid = ?self.pgid,
                grace_secs = self.grace_period.as_secs_f64(),
                "background processes ignored interrupt, killing"
            );
            self.signal(Signal::Kill);
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: Signal) -> bool {
        let Some(pgid) = self.pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return false;
        };
        let signal = match signal {
            Signal::Probe => 0,
            Signal::Interrupt => libc::SIGINT,
            Signal::Kill => libc::SIGKILL,
        };
        // SAFETY: kill(2) has no memory-safety preconditions.
        unsafe { libc::kill(-pgid, signal) == 0 }
    }

    #[cfg(not(unix))]
    fn signal(&self, _signal: Signal) -> bool {
        false
    }
}

const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
enum Signal {
    Probe,
    Interrupt,
    Kill,
}

/// Exit code of a finished process; signals map to 128 + signal number
fn normalize_exit(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(signal) = status.signal() {
            128 + signal
        } else {
            SYNTHETIC_FAILURE
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(SYNTHETIC_FAILURE)
    }
}

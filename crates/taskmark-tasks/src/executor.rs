//! Script execution seam used by the scheduler

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use taskmark_core::{Script, Task};

use crate::reporter::{TaskEvent, TaskReporter};
use crate::runner::{RunnerError, ScriptRunner, DEFAULT_GRACE_PERIOD};

/// Everything needed to run one script of a task
#[derive(Debug, Clone)]
pub struct ScriptContext {
    /// The owning task
    pub task: Arc<Task>,
    /// Index of the script within the task
    pub index: usize,
    /// Effective environment (global overridden by task variables)
    pub env: Arc<BTreeMap<String, String>>,
    /// Document root, used as working directory
    pub root_dir: Arc<PathBuf>,
    /// Fires when the run is cancelled
    pub cancel: CancellationToken,
}

impl ScriptContext {
    /// The script to run
    pub fn script(&self) -> Option<&Script> {
        self.task.scripts.get(self.index)
    }
}

/// Runs a single script and returns its exit code
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, ctx: ScriptContext) -> Result<i32, RunnerError>;
}

/// Executor that runs scripts as external processes and streams their
/// output to a reporter line by line
pub struct ProcessExecutor {
    reporter: Arc<dyn TaskReporter>,
    grace_period: Duration,
}

impl ProcessExecutor {
    pub fn new(reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            reporter,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Time between interrupt and kill on cancellation
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

#[async_trait]
impl ScriptExecutor for ProcessExecutor {
    async fn execute(&self, ctx: ScriptContext) -> Result<i32, RunnerError> {
        let Some(script) = ctx.script() else {
            return Ok(0);
        };

        let mut running = ScriptRunner::new(script)
            .current_dir(&ctx.root_dir)
            .envs(&ctx.env)
            .grace_period(self.grace_period)
            .spawn()?;

        let call = ctx.task.call.clone();
        let mut pumps = JoinSet::new();
        if let Some(out) = running.take_stdout() {
            pumps.spawn(pump_lines(out, call.clone(), false, self.reporter.clone()));
        }
        if let Some(err) = running.take_stderr() {
            pumps.spawn(pump_lines(err, call.clone(), true, self.reporter.clone()));
        }

        let group = running.group();
        let exit = running.wait(&ctx.cancel).await;

        // Background processes of the script can hold the pipes open.
        let cancelled = tokio::select! {
            biased;
            _ = drain(&mut pumps, &call) => false,
            _ = ctx.cancel.cancelled() => true,
        };
        if cancelled {
            let killed = tokio::select! {
                biased;
                _ = drain(&mut pumps, &call) => false,
                _ = group.terminate() => true,
            };
            if killed {
                pumps.abort_all();
            }
        }
        exit
    }
}

async fn drain(pumps: &mut JoinSet<()>, call: &str) {
    while let Some(joined) = pumps.join_next().await {
        if let Err(e) = joined {
            tracing::debug!(task = %call, "output pump failed: {}", e);
        }
    }
}

async fn pump_lines<R>(reader: R, call: String, is_stderr: bool, reporter: Arc<dyn TaskReporter>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        reporter.report(&TaskEvent::Output {
            call: call.clone(),
            line,
            is_stderr,
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;

    fn context(task: Task) -> ScriptContext {
        ScriptContext {
            task: Arc::new(task),
            index: 0,
            env: Arc::new(BTreeMap::from([("NAME".to_string(), "world".to_string())])),
            root_dir: Arc::new(std::env::temp_dir()),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_streams_output_lines() {
        let reporter = Arc::new(CollectingReporter::default());
        let executor = ProcessExecutor::new(reporter.clone());
        let task = Task::new("greet").with_script(
            Script::new("/bin/sh", "echo hello $NAME; echo oops >&2; exit 4").with_cmd_flag("-c"),
        );

        let code = executor.execute(context(task)).await.unwrap();
        assert_eq!(code, 4);

        let events = reporter.events();
        assert!(events.contains(&TaskEvent::Output {
            call: "greet".to_string(),
            line: "hello world".to_string(),
            is_stderr: false,
        }));
        assert!(events.contains(&TaskEvent::Output {
            call: "greet".to_string(),
            line: "oops".to_string(),
            is_stderr: true,
        }));
    }

    #[tokio::test]
    async fn test_missing_script_is_noop() {
        let executor = ProcessExecutor::new(Arc::new(CollectingReporter::default()));
        let code = executor.execute(context(Task::new("empty"))).await.unwrap();
        assert_eq!(code, 0);
    }
}

//! Task scheduler, a dependency-aware async executor using tokio
//!
//! Every selected task gets its own worker. A worker waits until all of its
//! dependencies have been announced as finished, evaluates its require and
//! skip conditions, runs its scripts concurrently and sends exactly one
//! report back. The dispatcher is the only place that mutates the
//! [`Document`]: it records new fingerprints, broadcasts completions to all
//! workers and cancels the run on the first failure.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use taskmark_core::{Document, Task};

use crate::condition::ConditionEvaluator;
use crate::dag::select_tasks;
use crate::executor::{ProcessExecutor, ScriptContext, ScriptExecutor};
use crate::fingerprint::compute_fingerprint;
use crate::reporter::{TaskEvent, TaskReporter};
use crate::runner::{RunnerError, DEFAULT_GRACE_PERIOD, SYNTHETIC_FAILURE};

/// Final outcome of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// All scripts exited with code 0
    Success,
    /// The skip group was satisfied
    Skipped,
    /// The require group was not satisfied
    RequireUnsatisfied,
    /// A script failed with this exit code
    Failed(i32),
}

impl TaskOutcome {
    /// Check if this outcome lets dependents proceed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped)
    }

    /// Exit code the task reports
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success | Self::Skipped => 0,
            Self::RequireUnsatisfied => SYNTHETIC_FAILURE,
            Self::Failed(code) => *code,
        }
    }
}

/// Options for the task scheduler
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Time between interrupt and kill when a run is cancelled
    pub grace_period: Duration,
    /// Maximum concurrently running scripts (unlimited when `None`)
    pub max_parallel: Option<usize>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            max_parallel: None,
        }
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 0 on success, otherwise the first failing task's exit code
    pub exit_code: i32,
    /// Whether the caller's cancellation token fired
    pub cancelled: bool,
    /// Outcome of every task that reported
    pub outcomes: BTreeMap<String, TaskOutcome>,
    /// Tasks selected for the run
    pub selected: BTreeSet<String>,
    /// Requested names that matched no task
    pub unknown: Vec<String>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl RunReport {
    /// Check if the run succeeded
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.cancelled
    }
}

/// Task scheduler that executes the dependency closure of requested tasks
pub struct TaskScheduler {
    options: SchedulerOptions,
    executor: Arc<dyn ScriptExecutor>,
    reporter: Arc<dyn TaskReporter>,
}

impl TaskScheduler {
    /// Create a new scheduler
    pub fn new(
        options: SchedulerOptions,
        executor: Arc<dyn ScriptExecutor>,
        reporter: Arc<dyn TaskReporter>,
    ) -> Self {
        Self {
            options,
            executor,
            reporter,
        }
    }

    /// Create a scheduler that runs scripts as external processes
    pub fn with_processes(options: SchedulerOptions, reporter: Arc<dyn TaskReporter>) -> Self {
        let executor = ProcessExecutor::new(reporter.clone()).with_grace_period(options.grace_period);
        Self::new(options, Arc::new(executor), reporter)
    }

    /// Run `requested` and everything they depend on.
    ///
    /// Fingerprints of tasks that succeed are recorded on `document`.
    /// Cancelling `cancel` stops the run and interrupts running scripts.
    #[instrument(skip_all, fields(requested = ?requested))]
    pub async fn execute(
        &self,
        document: &mut Document,
        requested: &[String],
        cancel: &CancellationToken,
    ) -> RunReport {
        let start = Instant::now();
        let selection = select_tasks(document, requested);
        let run = cancel.child_token();
        let limiter = self
            .options
            .max_parallel
            .map(|permits| Arc::new(Semaphore::new(permits)));
        let root_dir = Arc::new(document.root_dir().to_path_buf());

        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<TaskReport>();
        let mut inboxes = Vec::with_capacity(selection.len());
        let mut workers = JoinSet::new();

        for call in selection.tasks() {
            let Some(task) = document.task(call) else {
                continue;
            };
            let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
            inboxes.push(inbox_tx);
            let worker = Worker {
                task: Arc::new(task.clone()),
                env: Arc::new(document.effective_env(task)),
                pending: task.depends.iter().cloned().collect(),
                reports: report_tx.clone(),
                cancel: run.clone(),
                root_dir: root_dir.clone(),
                executor: self.executor.clone(),
                reporter: self.reporter.clone(),
                limiter: limiter.clone(),
            };
            workers.spawn(worker.run(inbox_rx));
        }
        drop(report_tx);

        let total = workers.len();
        info!(tasks = total, "starting run");

        let mut outcomes = BTreeMap::new();
        let mut exit_code = 0;

        while outcomes.len() < total {
            tokio::select! {
                report = report_rx.recv() => {
                    let Some(report) = report else {
                        break;
                    };
                    let outcome = report.outcome;
                    let call = record(document, &mut outcomes, report);
                    if !outcome.is_success() {
                        exit_code = outcome.exit_code();
                        debug!(task = %call, exit_code, "task failed, cancelling run");
                        run.cancel();
                        break;
                    }
                    for inbox in &inboxes {
                        let _ = inbox.send(call.clone());
                    }
                }
                Some(joined) = workers.join_next() => {
                    if let Err(e) = joined {
                        error!("task worker failed: {}", e);
                        exit_code = SYNTHETIC_FAILURE;
                        run.cancel();
                        break;
                    }
                }
                _ = run.cancelled() => break,
            }
        }

        run.cancel();
        drop(inboxes);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("task worker failed: {}", e);
            }
        }
        // Reports sent before cancellation still carry valid fingerprints.
        while let Ok(report) = report_rx.try_recv() {
            record(document, &mut outcomes, report);
        }

        let cancelled = cancel.is_cancelled();
        if exit_code == 0 && (cancelled || outcomes.len() < total) {
            exit_code = SYNTHETIC_FAILURE;
        }

        let duration = start.elapsed();
        let succeeded = outcomes
            .values()
            .filter(|o| matches!(o, TaskOutcome::Success))
            .count();
        let skipped = outcomes
            .values()
            .filter(|o| matches!(o, TaskOutcome::Skipped))
            .count();
        self.reporter.report(&TaskEvent::AllCompleted {
            total,
            succeeded,
            skipped,
            failed: outcomes.len() - succeeded - skipped,
            duration,
        });

        RunReport {
            exit_code,
            cancelled,
            outcomes,
            selected: selection.tasks().clone(),
            unknown: selection.unknown().to_vec(),
            duration,
        }
    }
}

/// Apply a worker's report to the document and outcome table
fn record(
    document: &mut Document,
    outcomes: &mut BTreeMap<String, TaskOutcome>,
    report: TaskReport,
) -> String {
    for update in &report.fingerprints {
        document.record_digest(&report.call, &update.paths, &update.ignores, &update.digest);
    }
    outcomes.insert(report.call.clone(), report.outcome);
    report.call
}

#[derive(Debug)]
struct TaskReport {
    call: String,
    outcome: TaskOutcome,
    fingerprints: Vec<FingerprintUpdate>,
}

#[derive(Debug)]
struct FingerprintUpdate {
    paths: BTreeSet<String>,
    ignores: BTreeSet<String>,
    digest: String,
}

struct Worker {
    task: Arc<Task>,
    env: Arc<BTreeMap<String, String>>,
    pending: HashSet<String>,
    reports: mpsc::UnboundedSender<TaskReport>,
    cancel: CancellationToken,
    root_dir: Arc<std::path::PathBuf>,
    executor: Arc<dyn ScriptExecutor>,
    reporter: Arc<dyn TaskReporter>,
    limiter: Option<Arc<Semaphore>>,
}

impl Worker {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<String>) {
        if !self.wait_for_dependencies(&mut inbox).await {
            debug!(task = %self.task.call, "run cancelled before task started");
            return;
        }
        drop(inbox);

        let started = Instant::now();
        match self.gate().await {
            Some(outcome) => self.finish(outcome, Vec::new(), started),
            None => self.run_scripts(started).await,
        }
    }

    /// Returns false when the run is cancelled first
    async fn wait_for_dependencies(&mut self, inbox: &mut mpsc::UnboundedReceiver<String>) -> bool {
        while !self.pending.is_empty() {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                finished = inbox.recv() => match finished {
                    Some(call) => {
                        self.pending.remove(&call);
                    }
                    None => return false,
                },
            }
        }
        !self.cancel.is_cancelled()
    }

    /// Evaluate require, then skip. `None` means the scripts should run.
    async fn gate(&self) -> Option<TaskOutcome> {
        let task = self.task.clone();
        let root_dir = self.root_dir.clone();
        let verdict = tokio::task::spawn_blocking(move || {
            let evaluator = ConditionEvaluator::new(&root_dir);
            if !evaluator.evaluate_require(&task.call, &task.require) {
                Some(TaskOutcome::RequireUnsatisfied)
            } else if evaluator.evaluate_skip(&task.call, &task.skip) {
                Some(TaskOutcome::Skipped)
            } else {
                None
            }
        })
        .await;

        verdict.unwrap_or_else(|e| {
            error!(task = %self.task.call, "condition evaluation failed: {}", e);
            Some(TaskOutcome::Failed(SYNTHETIC_FAILURE))
        })
    }

    async fn run_scripts(&self, started: Instant) {
        self.reporter.report(&TaskEvent::Started {
            call: self.task.call.clone(),
            scripts: self.task.scripts.len(),
        });

        let mut scripts = JoinSet::new();
        for index in 0..self.task.scripts.len() {
            let ctx = ScriptContext {
                task: self.task.clone(),
                index,
                env: self.env.clone(),
                root_dir: self.root_dir.clone(),
                cancel: self.cancel.clone(),
            };
            scripts.spawn(run_script(
                self.executor.clone(),
                self.limiter.clone(),
                ctx,
            ));
        }

        while let Some(joined) = scripts.join_next().await {
            let code = match joined {
                Ok(Ok(code)) => code,
                Ok(Err(RunnerError::Cancelled)) => SYNTHETIC_FAILURE,
                Ok(Err(e)) => {
                    error!(task = %self.task.call, "{}", e);
                    SYNTHETIC_FAILURE
                }
                Err(e) => {
                    error!(task = %self.task.call, "script task failed: {}", e);
                    SYNTHETIC_FAILURE
                }
            };
            if code != 0 {
                self.finish(TaskOutcome::Failed(code), Vec::new(), started);
                // Remaining scripts are interrupted by the cancelled run.
                while scripts.join_next().await.is_some() {}
                return;
            }
        }

        let fingerprints = self.fingerprints().await;
        self.finish(TaskOutcome::Success, fingerprints, started);
    }

    /// Digests of the task's content rules after a successful run
    async fn fingerprints(&self) -> Vec<FingerprintUpdate> {
        let task = self.task.clone();
        let root_dir = self.root_dir.clone();
        let computed = tokio::task::spawn_blocking(move || {
            task.skip
                .content_rules()
                .filter_map(|rule| {
                    match compute_fingerprint(&root_dir, &rule.paths, &rule.ignores) {
                        Ok(digest) => Some(FingerprintUpdate {
                            paths: rule.paths.clone(),
                            ignores: rule.ignores.clone(),
                            digest,
                        }),
                        Err(e) => {
                            warn!(task = %task.call, "failed to compute fingerprint: {}", e);
                            None
                        }
                    }
                })
                .collect::<Vec<_>>()
        })
        .await;

        computed.unwrap_or_else(|e| {
            warn!(task = %self.task.call, "fingerprint computation failed: {}", e);
            Vec::new()
        })
    }

    /// Send the task's single report unless the run was cancelled
    fn finish(&self, outcome: TaskOutcome, fingerprints: Vec<FingerprintUpdate>, started: Instant) {
        let call = self.task.call.clone();
        if self.cancel.is_cancelled() {
            debug!(task = %call, ?outcome, "run cancelled, discarding outcome");
            return;
        }

        let duration = started.elapsed();
        let event = match outcome {
            TaskOutcome::Success => TaskEvent::Completed {
                call: call.clone(),
                duration,
            },
            TaskOutcome::Skipped => TaskEvent::Skipped {
                call: call.clone(),
                reason: "skip rules satisfied".to_string(),
            },
            TaskOutcome::RequireUnsatisfied => TaskEvent::RequireUnsatisfied { call: call.clone() },
            TaskOutcome::Failed(exit_code) => TaskEvent::Failed {
                call: call.clone(),
                exit_code,
                duration,
            },
        };
        self.reporter.report(&event);

        let _ = self.reports.send(TaskReport {
            call,
            outcome,
            fingerprints,
        });
    }
}

async fn run_script(
    executor: Arc<dyn ScriptExecutor>,
    limiter: Option<Arc<Semaphore>>,
    ctx: ScriptContext,
) -> Result<i32, RunnerError> {
    let _permit = match limiter {
        Some(limiter) => tokio::select! {
            permit = limiter.acquire_owned() => permit.ok(),
            _ = ctx.cancel.cancelled() => return Err(RunnerError::Cancelled),
        },
        None => None,
    };
    if ctx.cancel.is_cancelled() {
        return Err(RunnerError::Cancelled);
    }
    executor.execute(ctx).await
}

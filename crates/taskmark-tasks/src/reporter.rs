//! Task execution reporting

use std::time::Duration;

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A task passed its condition gate and is starting its scripts
    Started {
        call: String,
        scripts: usize,
    },
    /// A script produced a line of output
    Output {
        call: String,
        line: String,
        is_stderr: bool,
    },
    /// A task was skipped because its skip group was satisfied
    Skipped {
        call: String,
        reason: String,
    },
    /// A task's require group was not satisfied
    RequireUnsatisfied {
        call: String,
    },
    /// A task completed successfully
    Completed {
        call: String,
        duration: Duration,
    },
    /// A task failed
    Failed {
        call: String,
        exit_code: i32,
        duration: Duration,
    },
    /// The run finished
    AllCompleted {
        total: usize,
        succeeded: usize,
        skipped: usize,
        failed: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { call, scripts } => {
                tracing::info!(task = %call, scripts, "task start");
            }
            TaskEvent::Output {
                call,
                line,
                is_stderr,
            } => {
                if *is_stderr {
                    tracing::warn!("[{}] {}", call, line);
                } else {
                    tracing::debug!("[{}] {}", call, line);
                }
            }
            TaskEvent::Skipped { call, reason } => {
                tracing::info!(task = %call, "task skipped: {}", reason);
            }
            TaskEvent::RequireUnsatisfied { call } => {
                tracing::error!(task = %call, "task's require rules are insufficient");
            }
            TaskEvent::Completed { call, duration } => {
                tracing::info!("{} completed in {:.1}s", call, duration.as_secs_f64());
            }
            TaskEvent::Failed {
                call,
                exit_code,
                duration,
            } => {
                tracing::error!(
                    "{} failed with exit code {} after {:.1}s",
                    call,
                    exit_code,
                    duration.as_secs_f64()
                );
            }
            TaskEvent::AllCompleted {
                total,
                succeeded,
                skipped,
                failed,
                duration,
            } => {
                tracing::info!(
                    "All tasks complete: {}/{} succeeded, {} skipped, {} failed ({:.1}s)",
                    succeeded,
                    total,
                    skipped,
                    failed,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count the events matching a predicate
    pub fn count(&self, predicate: impl Fn(&TaskEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

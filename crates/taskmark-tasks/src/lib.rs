//! Taskmark Tasks - concurrent task execution engine
//!
//! This crate selects the tasks a run needs, gates each one on its
//! require/skip conditions, runs scripts as external processes under a
//! dependency-aware scheduler and keeps the content fingerprints used for
//! incremental skips.

pub mod condition;
pub mod dag;
pub mod executor;
pub mod fingerprint;
pub mod glob;
pub mod reporter;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use condition::ConditionEvaluator;
pub use dag::{select_tasks, DagError, Selection};
pub use executor::{ProcessExecutor, ScriptContext, ScriptExecutor};
pub use fingerprint::{compute_fingerprint, FingerprintError};
pub use glob::{FileGlob, GlobError};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TracingReporter};
pub use runner::{ProcessGroup, RunnerError, RunningScript, ScriptRunner, SYNTHETIC_FAILURE};
pub use scheduler::{RunReport, SchedulerOptions, TaskOutcome, TaskScheduler};
pub use state::{FingerprintRecord, FingerprintStore, RuleDefinition, StateError, StateFile};

pub use tokio_util::sync::CancellationToken;

//! Manifest types

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults::{DEFAULT_GRACE_PERIOD_SECS, DEFAULT_STATE_FILE};

/// Root manifest describing a task document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Document title
    pub title: String,

    /// Document description
    pub description: String,

    /// Document root, relative to the manifest directory (defaults to it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Dotenv files read into the global environment, relative to the root
    pub dotenv: Vec<PathBuf>,

    /// Global environment variables, overriding dotenv values
    pub env: BTreeMap<String, String>,

    /// Runner settings
    pub settings: Settings,

    /// Tasks keyed by call name
    pub tasks: BTreeMap<String, TaskManifest>,
}

/// Runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fingerprint state file, relative to the manifest directory
    pub state_file: PathBuf,

    /// Seconds between the interrupt and the kill on cancellation
    pub grace_period_secs: u64,

    /// Cap on concurrently running scripts (unlimited when unset)
    pub max_parallel: Option<usize>,

    /// Language interpreter overrides
    pub interpreters: BTreeMap<String, InterpreterConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            max_parallel: None,
            interpreters: BTreeMap::new(),
        }
    }
}

/// Interpreter override for a language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Command name or path
    pub command: String,

    /// Flag used to pass inline code; the body goes through stdin when unset
    #[serde(default)]
    pub cmd_flag: Option<String>,

    /// Extra arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// A task in the manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManifest {
    /// Human readable title
    pub title: String,

    /// Longer description
    pub description: String,

    /// Dotenv files read into the task environment
    pub dotenv: Vec<PathBuf>,

    /// Environment overrides, taking precedence over the task's dotenv files
    pub env: BTreeMap<String, String>,

    /// Tasks that must complete first
    pub depends: Vec<String>,

    /// Scripts, run concurrently
    pub scripts: Vec<ScriptManifest>,

    /// Skip containers (any satisfied container skips the task)
    pub skip: Vec<SkipManifest>,

    /// Require containers (one must be satisfied for the task to run)
    pub require: Vec<RequireManifest>,
}

/// A script in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptManifest {
    /// Language, resolved to an interpreter
    pub lang: String,

    /// Script body
    pub run: String,
}

/// One skip container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipManifest {
    /// Globs that must each match at least one file
    pub exists: Vec<String>,

    /// File sets that must be unchanged since the last successful run
    pub unchanged: Vec<UnchangedManifest>,
}

/// A content-unchanged rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnchangedManifest {
    /// Include globs
    pub paths: Vec<String>,

    /// Ignore globs
    pub ignores: Vec<String>,
}

/// One require container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequireManifest {
    /// Globs that must each match at least one file
    pub exists: Vec<String>,
}

//! Error types for Taskmark

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for Taskmark core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Document construction errors
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Manifest file not found
    #[error("Task manifest not found in {0} or any parent directory")]
    NotFound(PathBuf),

    /// Invalid manifest value
    #[error("Invalid manifest: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Malformed dotenv file
    #[error("Invalid dotenv file {path}: {message}")]
    Dotenv { path: PathBuf, message: String },

    /// IO error
    #[error("IO error reading manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while constructing a task document.
///
/// All of these are fatal: nothing is executed once one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// Two tasks share a call name
    #[error("Task '{0}' is defined more than once")]
    DuplicateTask(String),

    /// The dependency graph contains a cycle
    #[error("Circular task dependency: {path}")]
    CircularDependency { path: String },

    /// A task depends on a name that is not defined
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    /// No interpreter could be resolved for a script language
    #[error("Task '{task}' uses language '{lang}' but no interpreter was found for it")]
    UnresolvedInterpreter { task: String, lang: String },

    /// Require groups only accept file-exists rules
    #[error("Task '{0}' has a content-unchanged rule in its require group")]
    ContentRuleInRequire(String),

    /// The document root must be an absolute path
    #[error("Document root must be an absolute path: {0}")]
    RelativeRoot(PathBuf),
}

impl CoreError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

//! Taskmark Core - task graph model and configuration
//!
//! This crate provides the in-memory task graph (documents, tasks, scripts and
//! their skip/require rule groups), construction-time validation, the error
//! taxonomy shared by the workspace, manifest loading and interpreter
//! resolution.

pub mod config;
pub mod error;
pub mod interpreter;
pub mod model;

pub use error::{ConfigError, CoreError, DocumentError, Result};
pub use interpreter::{ExecConfig, InterpreterTable};
pub use model::{
    ContentRule, Document, DocumentBuilder, Rule, RuleContainer, RuleGroup, Script, Task,
};

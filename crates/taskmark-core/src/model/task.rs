//! Task and script definitions

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::rules::RuleGroup;

/// One executable step of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Resolved interpreter path
    pub exec_path: PathBuf,
    /// Flag used to pass the body inline (e.g. "-c")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_flag: Option<String>,
    /// Extra interpreter arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Raw script body
    pub body: String,
}

impl Script {
    /// Create a script whose body is fed through standard input
    pub fn new(exec_path: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            exec_path: exec_path.into(),
            cmd_flag: None,
            args: Vec::new(),
            body: body.into(),
        }
    }

    /// Pass the body inline after this flag instead of through stdin
    pub fn with_cmd_flag(mut self, flag: impl Into<String>) -> Self {
        self.cmd_flag = Some(flag.into());
        self
    }

    /// Append interpreter arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Command-line arguments to pass to the interpreter
    pub fn command_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        if let Some(flag) = &self.cmd_flag {
            args.push(flag.clone());
            args.push(self.body.clone());
        }
        args.extend(self.args.iter().cloned());
        args
    }

    /// Whether the body is delivered through standard input
    pub fn uses_stdin(&self) -> bool {
        self.cmd_flag.is_none()
    }
}

/// A named unit of work in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Call name, unique within a document
    pub call: String,
    /// Human readable title
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Longer description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Scripts, run concurrently
    #[serde(default)]
    pub scripts: Vec<Script>,
    /// Environment overrides merged over the document environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Conditions under which the task is skipped
    #[serde(default, skip_serializing_if = "RuleGroup::is_empty")]
    pub skip: RuleGroup,
    /// Conditions that must hold before the task runs
    #[serde(default, skip_serializing_if = "RuleGroup::is_empty")]
    pub require: RuleGroup,
    /// Call names of tasks that must complete first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl Task {
    /// Create a new task with no scripts
    pub fn new(call: impl Into<String>) -> Self {
        Self {
            call: call.into(),
            title: String::new(),
            description: String::new(),
            scripts: Vec::new(),
            env: BTreeMap::new(),
            skip: RuleGroup::default(),
            require: RuleGroup::default(),
            depends: Vec::new(),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a script
    pub fn with_script(mut self, script: Script) -> Self {
        self.scripts.push(script);
        self
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add a dependency
    pub fn with_depends_on(mut self, dep: impl Into<String>) -> Self {
        self.depends.push(dep.into());
        self
    }

    /// Set the skip group
    pub fn with_skip(mut self, skip: RuleGroup) -> Self {
        self.skip = skip;
        self
    }

    /// Set the require group
    pub fn with_require(mut self, require: RuleGroup) -> Self {
        self.require = require;
        self
    }

    /// Name shown to users: the title when set, otherwise the call name
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.call
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new("build")
            .with_title("Build the binary")
            .with_script(Script::new("/bin/sh", "cargo build").with_cmd_flag("-c"))
            .with_env("PROFILE", "release")
            .with_depends_on("lint");

        assert_eq!(task.call, "build");
        assert_eq!(task.display_name(), "Build the binary");
        assert_eq!(task.scripts.len(), 1);
        assert_eq!(task.env.get("PROFILE").map(String::as_str), Some("release"));
        assert_eq!(task.depends, vec!["lint"]);
    }

    #[test]
    fn test_display_name_falls_back_to_call() {
        assert_eq!(Task::new("lint").display_name(), "lint");
    }

    #[test]
    fn test_command_args_inline() {
        let script = Script::new("/bin/bash", "echo hi")
            .with_cmd_flag("-c")
            .with_args(vec!["--".to_string()]);
        assert_eq!(script.command_args(), vec!["-c", "echo hi", "--"]);
        assert!(!script.uses_stdin());
    }

    #[test]
    fn test_command_args_stdin() {
        let script = Script::new("/usr/bin/python3", "print(1)").with_args(vec!["-u".to_string()]);
        assert_eq!(script.command_args(), vec!["-u"]);
        assert!(script.uses_stdin());
    }
}

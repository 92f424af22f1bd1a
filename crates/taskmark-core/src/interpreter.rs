//! Interpreter resolution for script languages

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::InterpreterConfig;

/// A resolved interpreter invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Absolute path of the interpreter
    pub exec_path: PathBuf,
    /// Flag that passes inline code, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_flag: Option<String>,
    /// Extra arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Built-in language table: (languages, command, inline flag)
const DEFAULT_INTERPRETERS: &[(&[&str], &str, &str)] = &[
    (&["sh", "shell"], "sh", "-c"),
    (&["bash"], "bash", "-c"),
    (&["powershell", "posh"], "powershell", "-Command"),
    (&["py", "python"], "python", "-c"),
    (&["js", "javascript"], "node", "-e"),
];

/// Language name to interpreter mapping
#[derive(Debug, Clone, Default)]
pub struct InterpreterTable {
    entries: HashMap<String, ExecConfig>,
}

impl InterpreterTable {
    /// An empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve the built-in languages against `PATH`.
    ///
    /// Commands that cannot be found are left out of the table.
    pub fn detect() -> Self {
        let mut table = Self::empty();
        for (languages, command, flag) in DEFAULT_INTERPRETERS {
            let Some(exec_path) = lookup(command) else {
                debug!(command, "interpreter not found on PATH");
                continue;
            };
            for lang in *languages {
                table.insert(
                    lang,
                    ExecConfig {
                        exec_path: exec_path.clone(),
                        cmd_flag: Some(flag.to_string()),
                        args: Vec::new(),
                    },
                );
            }
        }
        table
    }

    /// Apply manifest overrides on top of the current table
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, InterpreterConfig>) -> Self {
        for (lang, config) in overrides {
            match lookup(&config.command) {
                Some(exec_path) => self.insert(
                    lang,
                    ExecConfig {
                        exec_path,
                        cmd_flag: config.cmd_flag.clone().filter(|f| !f.is_empty()),
                        args: config.args.clone(),
                    },
                ),
                None => {
                    debug!(lang = %lang, command = %config.command, "override interpreter not found");
                    self.entries.remove(&lang.to_lowercase());
                }
            }
        }
        self
    }

    /// Register an interpreter for a language
    pub fn insert(&mut self, lang: &str, config: ExecConfig) {
        self.entries.insert(lang.to_lowercase(), config);
    }

    /// Find the interpreter for a language (case-insensitive)
    pub fn resolve(&self, lang: &str) -> Option<&ExecConfig> {
        self.entries.get(&lang.to_lowercase())
    }

    /// Number of languages with an interpreter
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no language is resolvable
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn lookup(command: &str) -> Option<PathBuf> {
    which::which(command).ok()
}

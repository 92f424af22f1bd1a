//! Require and skip condition evaluation
//!
//! A rule group is an OR over containers and each container is an AND over
//! its rules. The two groups treat failures differently: a require check
//! only invalidates a container when a pattern cannot match anything, while
//! any error during a skip check means the task runs.

use std::path::Path;

use tracing::{debug, error, warn};

use taskmark_core::{ContentRule, Rule, RuleContainer, RuleGroup};

use crate::fingerprint::{compute_fingerprint, FingerprintError};
use crate::glob::{FileGlob, GlobError};

/// Evaluates rule groups against the files under a document root
#[derive(Debug, Clone, Copy)]
pub struct ConditionEvaluator<'a> {
    root: &'a Path,
}

impl<'a> ConditionEvaluator<'a> {
    /// Create an evaluator for `root`
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Whether `task`'s require group is satisfied.
    ///
    /// A group with no rules imposes no requirement. Otherwise at least one
    /// non-empty container must have every pattern matching a file.
    pub fn evaluate_require(&self, task: &str, group: &RuleGroup) -> bool {
        if group.is_empty() {
            return true;
        }

        let mut missing = Vec::new();
        for (index, container) in group.containers.iter().enumerate() {
            if self.require_container(task, index, container, &mut missing) {
                debug!(task, container = index, "require rules satisfied");
                return true;
            }
        }

        for message in missing {
            error!(task, "{}", message);
        }
        false
    }

    fn require_container(
        &self,
        task: &str,
        index: usize,
        container: &RuleContainer,
        missing: &mut Vec<String>,
    ) -> bool {
        if container.is_empty() {
            return false;
        }

        let mut valid = true;
        for rule in &container.rules {
            match self.check_rule(rule) {
                Ok(true) => {}
                Ok(false) => {
                    valid = false;
                    missing.push(format!("required files are missing: {}", describe(rule)));
                }
                Err(e) if e.is_pattern_not_exist() => {
                    valid = false;
                    missing.push(e.to_string());
                }
                Err(e) => {
                    warn!(task, container = index, "failed to evaluate require rule: {}", e);
                }
            }
        }
        valid
    }

    /// Whether `task` may be skipped.
    ///
    /// An empty group never skips. A container skips only when it has rules
    /// and all of them hold, and any evaluation error forces the task to run.
    pub fn evaluate_skip(&self, task: &str, group: &RuleGroup) -> bool {
        if group.is_empty() {
            return false;
        }

        for (index, container) in group.containers.iter().enumerate() {
            if self.skip_container(task, index, container) {
                debug!(task, container = index, "skip rules satisfied");
                return true;
            }
        }
        false
    }

    fn skip_container(&self, task: &str, index: usize, container: &RuleContainer) -> bool {
        if container.is_empty() {
            return false;
        }

        for rule in &container.rules {
            match self.check_rule(rule) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) if e.is_pattern_not_exist() => {
                    debug!(task, container = index, "{}", e);
                    return false;
                }
                Err(e) => {
                    warn!(task, container = index, "failed to evaluate skip rule: {}", e);
                    return false;
                }
            }
        }
        true
    }

    fn check_rule(&self, rule: &Rule) -> Result<bool, ConditionError> {
        match rule {
            Rule::FileExists { patterns } => self.any_file_exists(patterns),
            Rule::ContentUnchanged(content) => self.content_unchanged(content),
        }
    }

    fn any_file_exists(&self, patterns: &[String]) -> Result<bool, ConditionError> {
        let mut first_error = None;
        for pattern in patterns {
            match FileGlob::new(self.root, [pattern]).resolve() {
                Ok(files) if !files.is_empty() => return Ok(true),
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(false),
        }
    }

    fn content_unchanged(&self, rule: &ContentRule) -> Result<bool, ConditionError> {
        let Some(recorded) = rule.digest.as_deref() else {
            return Ok(false);
        };
        let current = compute_fingerprint(self.root, &rule.paths, &rule.ignores)?;
        Ok(current == recorded)
    }
}

fn describe(rule: &Rule) -> String {
    match rule {
        Rule::FileExists { patterns } => patterns.join(", "),
        Rule::ContentUnchanged(content) => content
            .paths
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[derive(Debug, thiserror::Error)]
enum ConditionError {
    #[error(transparent)]
    Glob(#[from] GlobError),
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

impl ConditionError {
    fn is_pattern_not_exist(&self) -> bool {
        match self {
            Self::Glob(e) | Self::Fingerprint(FingerprintError::Glob(e)) => e.is_pattern_not_exist(),
            Self::Fingerprint(_) => false,
        }
    }
}

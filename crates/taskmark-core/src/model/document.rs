//! Task documents

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::DocumentError;

use super::graph::validate_acyclic;
use super::rules::Rule;
use super::task::Task;

/// A validated task graph.
///
/// Documents are only produced by [`DocumentBuilder::build`], so every
/// instance has unique call names, known dependencies and no cycles. After
/// construction the only mutation allowed is recording fingerprint digests.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    #[serde(skip_serializing_if = "String::is_empty")]
    title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(rename = "rootdir")]
    root_dir: PathBuf,
    #[serde(rename = "global_envs", skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    tasks: BTreeMap<String, Task>,
}

impl Document {
    /// Document title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Document description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Absolute root directory; globs and scripts are relative to it
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Global environment
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Look up a task by call name
    pub fn task(&self, call: &str) -> Option<&Task> {
        self.tasks.get(call)
    }

    /// All tasks keyed by call name
    pub fn tasks(&self) -> &BTreeMap<String, Task> {
        &self.tasks
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the document has no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Environment for a task: global variables overridden by the task's own
    pub fn effective_env(&self, task: &Task) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        env.extend(task.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Record a digest on every content-unchanged skip rule of `call` whose
    /// definition matches. Returns how many rules were updated.
    pub fn record_digest(
        &mut self,
        call: &str,
        paths: &BTreeSet<String>,
        ignores: &BTreeSet<String>,
        digest: &str,
    ) -> usize {
        let Some(task) = self.tasks.get_mut(call) else {
            return 0;
        };

        let mut updated = 0;
        for rule in task.skip.content_rules_mut() {
            if rule.same_definition(paths, ignores) {
                rule.digest = Some(digest.to_string());
                updated += 1;
            }
        }
        updated
    }

    /// Whether any task carries a content-unchanged skip rule
    pub fn has_content_rules(&self) -> bool {
        self.tasks
            .values()
            .any(|task| task.skip.content_rules().next().is_some())
    }
}

/// Builder that validates a document before handing it out
#[derive(Debug)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Start a document rooted at an absolute directory
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let root_dir = root_dir.into();
        if !root_dir.is_absolute() {
            return Err(DocumentError::RelativeRoot(root_dir));
        }

        Ok(Self {
            document: Document {
                title: String::new(),
                description: String::new(),
                root_dir,
                env: BTreeMap::new(),
                tasks: BTreeMap::new(),
            },
        })
    }

    /// Set the title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.document.title = title.into();
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.document.description = description.into();
        self
    }

    /// Add a global environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.document.env.insert(key.into(), value.into());
        self
    }

    /// Add a task, failing if its call name is already taken
    pub fn add_task(&mut self, task: Task) -> Result<&mut Self, DocumentError> {
        if self.document.tasks.contains_key(&task.call) {
            return Err(DocumentError::DuplicateTask(task.call));
        }

        debug!(task = %task.call, "task added");
        self.document.tasks.insert(task.call.clone(), task);
        Ok(self)
    }

    /// Consuming variant of [`add_task`](Self::add_task)
    pub fn task(mut self, task: Task) -> Result<Self, DocumentError> {
        self.add_task(task)?;
        Ok(self)
    }

    /// Validate the graph and return the finished document
    pub fn build(self) -> Result<Document, DocumentError> {
        let document = self.document;

        for task in document.tasks.values() {
            if let Some(dependency) = task
                .depends
                .iter()
                .find(|dep| !document.tasks.contains_key(*dep))
            {
                return Err(DocumentError::UnknownDependency {
                    task: task.call.clone(),
                    dependency: dependency.clone(),
                });
            }

            let content_in_require = task
                .require
                .containers
                .iter()
                .flat_map(|c| c.rules.iter())
                .any(|rule| matches!(rule, Rule::ContentUnchanged(_)));
            if content_in_require {
                return Err(DocumentError::ContentRuleInRequire(task.call.clone()));
            }
        }

        validate_acyclic(&document.tasks)?;

        info!(
            task_count = document.tasks.len(),
            root = %document.root_dir.display(),
            "document built"
        );
        Ok(document)
    }
}

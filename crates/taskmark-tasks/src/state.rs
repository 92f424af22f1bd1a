//! Persisted fingerprint state
//!
//! Stored digests live in a JSON file next to the manifest. Loading attaches
//! them to matching content rules of a [`Document`], and saving captures the
//! document's current digests back.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use taskmark_core::{ContentRule, Document};

/// Errors reading or writing the state file
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("State file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Root of the state file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskState>,
}

/// Stored fingerprints for one task, keyed by rule key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub files: BTreeMap<String, FingerprintRecord>,
}

/// A rule definition with its last recorded digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub rule: RuleDefinition,
    #[serde(default)]
    pub digest: String,
}

/// Sorted include and ignore patterns of a content rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub paths: Vec<String>,
    #[serde(default)]
    pub ignores: Vec<String>,
}

impl RuleDefinition {
    /// Definition of a content rule
    pub fn of(rule: &ContentRule) -> Self {
        Self {
            paths: rule.paths.iter().cloned().collect(),
            ignores: rule.ignores.iter().cloned().collect(),
        }
    }

    /// Stable key: SHA-256 hex of the canonical JSON encoding
    pub fn key(&self) -> String {
        let mut sorted = self.clone();
        sorted.paths.sort();
        sorted.paths.dedup();
        sorted.ignores.sort();
        sorted.ignores.dedup();
        // Serializing two string vectors cannot fail.
        let encoded = serde_json::to_vec(&sorted).unwrap_or_default();
        format!("{:x}", Sha256::digest(&encoded))
    }

    fn path_set(&self) -> BTreeSet<String> {
        self.paths.iter().cloned().collect()
    }

    fn ignore_set(&self) -> BTreeSet<String> {
        self.ignores.iter().cloned().collect()
    }
}

impl StateFile {
    /// Capture every recorded digest of a document.
    ///
    /// Returns `None` when no task has a content rule, in which case nothing
    /// should be persisted.
    pub fn from_document(document: &Document) -> Option<Self> {
        if !document.has_content_rules() {
            return None;
        }

        let mut state = Self::default();
        for (call, task) in document.tasks() {
            let mut files = BTreeMap::new();
            for rule in task.skip.content_rules() {
                let Some(digest) = rule.digest.as_deref().filter(|d| !d.is_empty()) else {
                    continue;
                };
                let definition = RuleDefinition::of(rule);
                files.insert(
                    definition.key(),
                    FingerprintRecord {
                        rule: definition,
                        digest: digest.to_string(),
                    },
                );
            }
            if !files.is_empty() {
                state.tasks.insert(call.clone(), TaskState { files });
            }
        }
        Some(state)
    }

    /// Attach stored digests to the matching content rules of `document`.
    /// Returns the number of rules updated.
    pub fn apply_to(&self, document: &mut Document) -> usize {
        let mut applied = 0;
        for (call, task_state) in &self.tasks {
            for record in task_state.files.values() {
                if record.digest.is_empty() {
                    continue;
                }
                applied += document.record_digest(
                    call,
                    &record.rule.path_set(),
                    &record.rule.ignore_set(),
                    &record.digest,
                );
            }
        }
        applied
    }
}

/// State file bound to its location on disk
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    /// Create a store for the state file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file. A missing file is an empty state.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<StateFile, StateError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no state file, starting empty");
                return Ok(StateFile::default());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the state file and attach its digests to `document`.
    ///
    /// Unreadable state is logged and treated as empty.
    pub fn attach(&self, document: &mut Document) -> usize {
        match self.load() {
            Ok(state) => {
                let applied = state.apply_to(document);
                debug!(applied, "attached stored fingerprints");
                applied
            }
            Err(e) => {
                warn!("Ignoring state file: {}", e);
                0
            }
        }
    }

    /// Persist the digests of `document`.
    ///
    /// Nothing is written when the document has no content rules. Returns
    /// whether the file was written.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, document: &Document) -> Result<bool, StateError> {
        let Some(state) = StateFile::from_document(document) else {
            debug!("no content rules, state file not written");
            return Ok(false);
        };

        let json = serde_json::to_string_pretty(&state).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| StateError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(tasks = state.tasks.len(), "saved fingerprint state");
        Ok(true)
    }
}

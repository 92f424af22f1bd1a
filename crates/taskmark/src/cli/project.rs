//! Project loading: manifest, document and fingerprint state

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use taskmark_core::config::{
    build_document, load_manifest, load_manifest_from_dir, Manifest, DEFAULT_MANIFEST_TEMPLATE,
    DEFAULT_MANIFEST_YAML,
};
use taskmark_core::{ConfigError, Document, InterpreterTable, Result};
use taskmark_tasks::{FingerprintStore, SchedulerOptions};

/// A loaded manifest together with where its state lives
#[derive(Debug)]
pub struct Project {
    manifest: Manifest,
    manifest_path: PathBuf,
    root_dir: PathBuf,
    store: FingerprintStore,
}

impl Project {
    /// Load the manifest at `file` (relative to `dir`), or search `dir` and
    /// its parents when no file is given.
    pub fn load(dir: &Path, file: Option<&Path>) -> Result<Self> {
        let (manifest, manifest_path) = match file {
            Some(file) => {
                let path = dir.join(file);
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path).into());
                }
                (load_manifest(&path)?, path)
            }
            None => load_manifest_from_dir(dir)?,
        };

        let root_dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.to_path_buf());
        let state_path = root_dir.join(&manifest.settings.state_file);
        debug!(
            root = %root_dir.display(),
            state = %state_path.display(),
            "project loaded"
        );

        Ok(Self {
            manifest,
            manifest_path,
            root_dir,
            store: FingerprintStore::new(state_path),
        })
    }

    /// Path of the loaded manifest
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Path of the fingerprint state file
    pub fn state_path(&self) -> &Path {
        self.store.path()
    }

    /// Build the document and attach stored fingerprints
    pub fn document(&self) -> Result<Document> {
        let interpreters =
            InterpreterTable::detect().with_overrides(&self.manifest.settings.interpreters);
        let mut document = build_document(&self.manifest, &self.root_dir, &interpreters)?;
        self.store.attach(&mut document);
        Ok(document)
    }

    /// Scheduler options from the manifest settings
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            grace_period: Duration::from_secs(self.manifest.settings.grace_period_secs),
            max_parallel: self.manifest.settings.max_parallel,
        }
    }

    /// Persist the document's fingerprints. Failures are logged only.
    pub fn save_state(&self, document: &Document) {
        if let Err(e) = self.store.save(document) {
            warn!("Failed to save fingerprint state: {}", e);
        }
    }
}

/// Write the starter manifest into `dir`
pub fn init(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(DEFAULT_MANIFEST_YAML);
    if path.exists() {
        return Err(ConfigError::InvalidValue {
            field: "manifest".to_string(),
            message: format!("{} already exists", path.display()),
        }
        .into());
    }
    std::fs::write(&path, DEFAULT_MANIFEST_TEMPLATE).map_err(ConfigError::Io)?;
    Ok(path)
}

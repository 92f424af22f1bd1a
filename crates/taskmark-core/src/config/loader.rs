//! Manifest loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::manifest_file_names;
use super::types::Manifest;
use super::validation::validate_manifest;

/// Load a manifest from a file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let format = if path.extension().is_some_and(|e| e == "toml") {
        "TOML"
    } else {
        "YAML"
    };
    info!(path = %path.display(), format, "loading manifest");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let manifest: Manifest = if format == "TOML" {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    validate_manifest(&manifest)?;
    debug!(path = %path.display(), tasks = manifest.tasks.len(), "manifest loaded and validated");
    Ok(manifest)
}

/// Find a manifest in `start_dir` or its parents. The first match wins.
pub fn find_manifest(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for manifest");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in manifest_file_names() {
            let candidate = current.join(name);
            if candidate.is_file() {
                info!(path = %candidate.display(), "found manifest");
                return Some(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no manifest found");
    None
}

/// Load the manifest from a directory (searching parent directories)
pub fn load_manifest_from_dir(dir: &Path) -> Result<(Manifest, PathBuf)> {
    let path = find_manifest(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

    let manifest = load_manifest(&path)?;
    Ok((manifest, path))
}

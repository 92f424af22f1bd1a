//! Manifest validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Manifest;

/// Validate a manifest
pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    debug!("validating manifest");
    validate_settings(manifest)?;
    validate_tasks(manifest)?;
    debug!("manifest validation passed");
    Ok(())
}

fn validate_settings(manifest: &Manifest) -> Result<()> {
    if manifest.settings.grace_period_secs == 0 {
        return Err(ConfigError::InvalidValue {
            field: "settings.grace_period_secs".to_string(),
            message: "must be greater than zero".to_string(),
        }
        .into());
    }

    if manifest.settings.max_parallel == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: "settings.max_parallel".to_string(),
            message: "must be greater than zero when set".to_string(),
        }
        .into());
    }

    for (lang, interpreter) in &manifest.settings.interpreters {
        if interpreter.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("settings.interpreters.{lang}.command"),
                message: "command cannot be empty".to_string(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_tasks(manifest: &Manifest) -> Result<()> {
    for (call, task) in &manifest.tasks {
        if call.is_empty() || call.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: format!("tasks.{call}"),
                message: "task names must be non-empty and contain no whitespace".to_string(),
            }
            .into());
        }

        for (idx, script) in task.scripts.iter().enumerate() {
            if script.lang.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("tasks.{call}.scripts[{idx}].lang"),
                    message: "language cannot be empty".to_string(),
                }
                .into());
            }
        }

        for (idx, container) in task.skip.iter().enumerate() {
            if container.unchanged.iter().any(|u| u.paths.is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("tasks.{call}.skip[{idx}].unchanged"),
                    message: "each unchanged rule needs at least one path".to_string(),
                }
                .into());
            }
        }
    }

    Ok(())
}

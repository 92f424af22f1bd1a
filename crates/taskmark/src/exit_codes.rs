//! Exit codes for the CLI

use taskmark_core::CoreError;

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration or document construction error
pub const CONFIG_ERROR: i32 = 2;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// Exit code for an error that aborted the command
pub fn for_error(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CoreError>() {
        Some(CoreError::Config(_) | CoreError::Document(_)) => CONFIG_ERROR,
        _ => ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmark_core::{ConfigError, DocumentError};

    #[test]
    fn test_construction_errors_map_to_config_error() {
        let err = anyhow::Error::new(CoreError::from(DocumentError::DuplicateTask(
            "build".into(),
        )));
        assert_eq!(for_error(&err), CONFIG_ERROR);

        let err = anyhow::Error::new(CoreError::from(ConfigError::NotFound(".".into())));
        assert_eq!(for_error(&err), CONFIG_ERROR);
    }

    #[test]
    fn test_other_errors_are_general() {
        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
    }
}

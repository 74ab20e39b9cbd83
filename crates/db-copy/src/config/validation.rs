//! Configuration validation.

use super::CopyConfig;
use crate::core::identifier::validate_identifier;
use crate::error::{CopyError, Result};

/// Validate the configuration.
pub fn validate(config: &CopyConfig) -> Result<()> {
    if config.source.trim().is_empty() {
        return Err(CopyError::Config("source is required".into()));
    }
    if config.dest.trim().is_empty() {
        return Err(CopyError::Config("dest is required".into()));
    }
    if config.table.is_empty() {
        return Err(CopyError::Config("table is required".into()));
    }

    validate_identifier(&config.table)?;

    if config.batch_size < 1 {
        return Err(CopyError::Config(format!(
            "batch_size must be at least 1, got {}",
            config.batch_size
        )));
    }

    // Cannot copy a table onto itself
    if config.source == config.dest {
        return Err(CopyError::Config(
            "source and dest cannot be the same database".into(),
        ));
    }

    Ok(())
}

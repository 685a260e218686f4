//! # Configuration Errors

use thiserror::Error;

use crate::validator::ValidationReport;

/// Errors raised while reading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A configuration slice was rejected by its schema.
    #[error(transparent)]
    Validation(#[from] ValidationReport),

    /// A value exists but cannot be read as the requested type.
    #[error("invalid value at '{path}': {reason}")]
    InvalidValue { path: String, reason: String },
}

//! # Error Types
//!
//! Errors for the shared vocabulary itself.

use thiserror::Error;

/// Errors parsing a [`crate::ComponentKey`] from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentKeyError {
    /// The string has no `<kind>:` prefix.
    #[error("component key '{0}' is missing a kind prefix")]
    MissingPrefix(String),

    /// The prefix names no known component kind.
    #[error("unknown component kind '{0}'")]
    UnknownKind(String),

    /// Nothing follows the prefix.
    #[error("component key '{0}' has an empty name")]
    EmptyName(String),
}

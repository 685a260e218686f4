//! # Runtime Errors
//!
//! Failure taxonomy of the composition root.
//!
//! - [`CapabilityError`] surfaces directly to whoever asked for a capability.
//! - [`ModuleError`] and [`PluginError`] are collected per component into the
//!   bootstrap report.
//! - [`BootstrapError`] aborts orchestration; only infrastructure steps raise it.

use std::time::Duration;

use shared_config::ConfigError;
use thiserror::Error;

use crate::plugins::PluginPhase;

/// Boxed error returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors resolving a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// No factory is registered for the type.
    #[error("no capability registered for {type_name}")]
    NotRegistered { type_name: &'static str },

    /// The factory produced a value of another type.
    #[error("capability factory for {expected} produced a value of another type")]
    TypeMismatch { expected: &'static str },

    /// The synchronous accessor was used on an asynchronous factory.
    #[error("capability {type_name} has an async factory; resolve it with get_async")]
    SyncAsyncMismatch { type_name: &'static str },

    /// The factory asked for its own type while building it.
    #[error("circular dependency while building capability {type_name}")]
    CircularDependency { type_name: &'static str },

    /// The factory failed.
    #[error("capability factory for {type_name} failed: {reason}")]
    FactoryFailed { type_name: &'static str, reason: String },

    /// The instance's init hook failed; nothing was cached.
    #[error("init hook for capability {type_name} failed: {reason}")]
    InitFailed { type_name: &'static str, reason: String },
}

impl CapabilityError {
    /// Build a [`CapabilityError::FactoryFailed`] for `T`.
    pub fn factory_failed<T: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::FactoryFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// Errors registering or initializing a capability module.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// A module with this name is already registered.
    #[error("capability module '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The module's configuration slice was rejected.
    #[error("capability module '{module}' has invalid configuration: {source}")]
    Config {
        module: String,
        #[source]
        source: ConfigError,
    },

    /// The module's `initialize` failed.
    #[error("capability module '{module}' failed to initialize: {reason}")]
    Initialize { module: String, reason: String },

    /// The module's `initialize` panicked.
    #[error("capability module '{module}' panicked during initialize: {message}")]
    Panicked { module: String, message: String },

    /// A capability operation inside `initialize` failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

impl ModuleError {
    /// Shorthand for [`ModuleError::Initialize`].
    pub fn initialize(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Initialize {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure came from schema validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Config {
                source: ConfigError::Validation(_),
                ..
            }
        )
    }
}

/// Errors raised by or about a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The plugin reported a failure from one of its hooks.
    #[error("{0}")]
    Failed(String),

    /// A capability the plugin needed could not be resolved.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// A plugin with this name is already registered.
    #[error("plugin '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Registration was attempted after the init phase began.
    #[error("cannot register plugin '{0}': registration closed when init began")]
    PhaseClosed(String),

    /// A hook did not finish within the configured limit.
    #[error("{phase} hook of plugin '{plugin}' timed out after {limit:?}")]
    TimedOut {
        plugin: String,
        phase: PluginPhase,
        limit: Duration,
    },

    /// A hook panicked.
    #[error("{phase} hook of plugin '{plugin}' panicked: {message}")]
    Panicked {
        plugin: String,
        phase: PluginPhase,
        message: String,
    },
}

impl PluginError {
    /// Shorthand for [`PluginError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Errors building a view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// No builder is registered under the name.
    #[error("no view registered as '{0}'")]
    NotFound(String),

    /// The builder produced a view of another type.
    #[error("view '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Fatal orchestration errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration source failed to load.
    #[error("failed to load configuration: {0}")]
    Config(#[source] BoxError),

    /// The persistence collaborator failed to initialize.
    #[error("persistence backend '{backend}' failed to initialize: {source}")]
    Persistence {
        backend: String,
        #[source]
        source: BoxError,
    },

    /// The navigation collaborator could not be wired to the bus.
    #[error("navigation bridge failed to attach: {0}")]
    Navigation(#[source] BoxError),
}

//! Orchestration of one application bootstrap.

pub mod collaborators;
pub mod orchestrator;
pub mod report;

pub use collaborators::{ConfigSource, NavigationBridge, PersistenceBackend, StaticConfigSource};
pub use orchestrator::Bootstrapper;
pub use report::{BootstrapFailure, BootstrapReport, PluginTimings};

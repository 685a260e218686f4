//! Result of one orchestration run.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use shared_types::ComponentKey;
use thiserror::Error;

use crate::error::{ModuleError, PluginError};

/// A per-component failure collected during orchestration.
#[derive(Debug, Clone, Error)]
pub enum BootstrapFailure {
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Time spent in each hook of one plugin.
///
/// `None` means the hook did not run, e.g. a plugin rejected at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginTimings {
    pub register: Option<Duration>,
    pub init: Option<Duration>,
    pub start: Option<Duration>,
}

/// Timings and failures of one orchestration run.
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    /// Keyed by plugin name.
    pub timings: BTreeMap<String, PluginTimings>,
    /// Keyed by `adapter:<name>` or `plugin:<name>`.
    pub failures: BTreeMap<ComponentKey, BootstrapFailure>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl BootstrapReport {
    /// True when no component failed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn failure(&self, key: &ComponentKey) -> Option<&BootstrapFailure> {
        self.failures.get(key)
    }

    /// Record a failure unless `key` already has one.
    pub(crate) fn record(&mut self, key: ComponentKey, failure: impl Into<BootstrapFailure>) {
        self.failures.entry(key).or_insert_with(|| failure.into());
    }

    pub(crate) fn timings_mut(&mut self, plugin: &str) -> &mut PluginTimings {
        self.timings.entry(plugin.to_string()).or_default()
    }
}

impl fmt::Display for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded() {
            return write!(
                f,
                "bootstrap succeeded: {} plugins in {:?}",
                self.timings.len(),
                self.elapsed
            );
        }
        write!(
            f,
            "bootstrap finished with {} failures in {:?}:",
            self.failures.len(),
            self.elapsed
        )?;
        for (key, failure) in &self.failures {
            write!(f, "\n  {key}: {failure}")?;
        }
        Ok(())
    }
}

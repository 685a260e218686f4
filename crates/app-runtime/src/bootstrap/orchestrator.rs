//! # Orchestrator
//!
//! Runs one bootstrap over an [`AppContext`] in fixed order:
//!
//! ```text
//!   1. load configuration            ─┐
//!   2. initialize persistence         ├─ infrastructure: failure aborts
//!   3. attach navigation to the bus  ─┘
//!   4. register capability modules   ─┐
//!   5. register plugins               ├─ per component: failure recorded,
//!   6. init_all                       │  every component still attempted
//!   7. start_all                     ─┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use shared_types::ComponentKey;
use tracing::{error, info, warn};

use super::collaborators::{ConfigSource, NavigationBridge, PersistenceBackend};
use super::report::{BootstrapReport, PluginTimings};
use crate::capabilities::CapabilityModule;
use crate::container::AppContext;
use crate::error::BootstrapError;
use crate::plugins::{PhaseOutcome, Plugin, Registration};

/// Builder and runner for one orchestration.
pub struct Bootstrapper {
    source: Box<dyn ConfigSource>,
    persistence: Option<Box<dyn PersistenceBackend>>,
    navigation: Option<Box<dyn NavigationBridge>>,
    /// Modules with their `auto_init` flag, in registration order.
    modules: Vec<(Arc<dyn CapabilityModule>, bool)>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Bootstrapper {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            persistence: None,
            navigation: None,
            modules: Vec::new(),
            plugins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_persistence(mut self, backend: impl PersistenceBackend + 'static) -> Self {
        self.persistence = Some(Box::new(backend));
        self
    }

    #[must_use]
    pub fn with_navigation(mut self, bridge: impl NavigationBridge + 'static) -> Self {
        self.navigation = Some(Box::new(bridge));
        self
    }

    /// Add a capability module, initialized during the run.
    #[must_use]
    pub fn module(mut self, module: Arc<dyn CapabilityModule>) -> Self {
        self.modules.push((module, true));
        self
    }

    /// Add a capability module that is only recorded. Initialize it later
    /// with [`crate::capabilities::CapabilityRegistry::initialize_pending`].
    #[must_use]
    pub fn deferred_module(mut self, module: Arc<dyn CapabilityModule>) -> Self {
        self.modules.push((module, false));
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Run every step against `ctx`.
    ///
    /// Only the infrastructure steps return `Err`. Module and plugin
    /// failures are collected in the report; check
    /// [`BootstrapReport::succeeded`].
    pub async fn run(self, ctx: &AppContext) -> Result<BootstrapReport, BootstrapError> {
        let started = Instant::now();
        let mut report = BootstrapReport::default();
        info!(
            modules = self.modules.len(),
            plugins = self.plugins.len(),
            "Bootstrap starting"
        );

        // Step 1: configuration
        let tree = self.source.load().await.map_err(|e| {
            error!(error = %e, "Configuration source failed");
            BootstrapError::Config(e)
        })?;
        ctx.config().initialize(tree);

        // Step 2: persistence
        if let Some(backend) = &self.persistence {
            backend
                .initialize(ctx.config())
                .await
                .map_err(|source| {
                    error!(backend = backend.name(), error = %source, "Persistence failed");
                    BootstrapError::Persistence {
                        backend: backend.name().to_string(),
                        source,
                    }
                })?;
            info!(backend = backend.name(), "Persistence initialized");
        }

        // Step 3: navigation
        if let Some(bridge) = &self.navigation {
            bridge
                .attach(Arc::clone(ctx.events()))
                .map_err(BootstrapError::Navigation)?;
            info!("Navigation attached to event bus");
        }

        // Step 4: capability modules
        for (module, auto_init) in self.modules {
            let key = ComponentKey::adapter(module.name());
            if let Err(e) = ctx.capabilities().register_module(module, auto_init) {
                warn!(component = %key, error = %e, "Capability module failed");
                report.record(key, e);
            }
        }

        // Step 5: plugins
        for plugin in self.plugins {
            let name = plugin.name().to_string();
            let begun = Instant::now();
            match ctx.plugins().register(plugin) {
                Ok(Registration::Registered) => {
                    report.timings_mut(&name).register = Some(begun.elapsed());
                }
                Ok(Registration::Skipped) => {}
                Err(e) => report.record(ComponentKey::plugin(name), e),
            }
        }

        // Steps 6 and 7
        let init = ctx.plugins().init_all().await;
        absorb(&mut report, init, |t, d| t.init = Some(d));
        let start = ctx.plugins().start_all().await;
        absorb(&mut report, start, |t, d| t.start = Some(d));

        report.elapsed = started.elapsed();
        if report.succeeded() {
            info!(elapsed = ?report.elapsed, "Bootstrap succeeded");
        } else {
            warn!(
                elapsed = ?report.elapsed,
                failures = report.failures.len(),
                "Bootstrap finished with failures"
            );
        }
        Ok(report)
    }
}

fn absorb(
    report: &mut BootstrapReport,
    outcome: PhaseOutcome,
    set: impl Fn(&mut PluginTimings, Duration),
) {
    for (name, elapsed) in outcome.timings {
        set(report.timings_mut(&name), elapsed);
    }
    for (name, failure) in outcome.failures {
        report.record(ComponentKey::plugin(name), failure);
    }
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("modules", &self.modules.len())
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

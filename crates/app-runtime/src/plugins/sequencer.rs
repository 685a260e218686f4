//! # Plugin Sequencer
//!
//! Drives every active plugin through the staged lifecycle.
//!
//! ## Phases
//!
//! ```text
//!   register(P1) register(P2) register(P3)      every registration ...
//!   ─────────────────────────────────────── barrier
//!   init(P1)     init(P2)     init(P3)          ... completes before any init
//!   ─────────────────────────────────────── barrier
//!   start(P1)    start(P2)    start(P3)
//!   ───────────────────────────────────────
//!   stop(P3)     stop(P2)     stop(P1)          exact reverse of registration
//! ```
//!
//! Each batch walks the whole active list in order. A failing hook is
//! recorded against its plugin and the walk continues.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use shared_types::{AppLifecycleState, Metadata, RouteContribution, TabContribution};
use tracing::{debug, info, warn};

use super::config::SequencerConfig;
use super::plugin::{Plugin, PluginContext, PluginPhase, PluginState};
use crate::capabilities::CapabilityRegistry;
use crate::error::PluginError;
use crate::services::Services;

/// Result of registering one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The plugin joined the active list.
    Registered,
    /// The plugin is configured `active: false` and was left out.
    Skipped,
}

/// Outcome of one batch phase.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: PluginPhase,
    /// Time spent in each plugin's hook, in walk order.
    pub timings: Vec<(String, Duration)>,
    /// Plugins whose hook failed, in walk order.
    pub failures: Vec<(String, PluginError)>,
}

impl PhaseOutcome {
    fn new(phase: PluginPhase) -> Self {
        Self {
            phase,
            timings: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure recorded for `plugin`, if any.
    #[must_use]
    pub fn failure(&self, plugin: &str) -> Option<&PluginError> {
        self.failures
            .iter()
            .find(|(name, _)| name == plugin)
            .map(|(_, e)| e)
    }
}

/// Where the sequencer is in its own lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Registering,
    Initialized,
    Started,
    Stopped,
}

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    context: PluginContext,
    state: Mutex<PluginState>,
}

impl PluginEntry {
    fn name(&self) -> &str {
        self.context.name()
    }

    /// Move to `to` if currently in `from`.
    fn advance(&self, from: PluginState, to: PluginState) {
        let mut state = self.state.lock();
        if *state == from {
            *state = to;
        } else {
            debug!(plugin = self.name(), state = ?*state, target = ?to, "State not advanced");
        }
    }
}

/// Registers plugins and drives their batch phases.
pub struct PluginSequencer {
    services: Services,
    capabilities: Arc<CapabilityRegistry>,
    config: SequencerConfig,
    /// Active plugins in registration order.
    plugins: RwLock<Vec<Arc<PluginEntry>>>,
    /// Names of plugins left out by configuration.
    inactive: RwLock<Vec<String>>,
    routes: RwLock<Vec<RouteContribution>>,
    tabs: RwLock<Vec<TabContribution>>,
    stage: RwLock<Stage>,
}

impl PluginSequencer {
    #[must_use]
    pub fn new(
        services: Services,
        capabilities: Arc<CapabilityRegistry>,
        config: SequencerConfig,
    ) -> Self {
        Self {
            services,
            capabilities,
            config,
            plugins: RwLock::new(Vec::new()),
            inactive: RwLock::new(Vec::new()),
            routes: RwLock::new(Vec::new()),
            tabs: RwLock::new(Vec::new()),
            stage: RwLock::new(Stage::Registering),
        }
    }

    #[must_use]
    pub fn config(&self) -> SequencerConfig {
        self.config
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register a plugin.
    ///
    /// A plugin configured with `plugins.<name>.active: false` is skipped and
    /// never seen again. Otherwise its defaults are merged, its context is
    /// created, its `register` hook runs, and it joins the active list with
    /// its routes and tabs. If `register` fails the plugin is not added and
    /// its defaults are removed again.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<Registration, PluginError> {
        let name = plugin.name().to_string();

        if *self.stage.read() != Stage::Registering {
            return Err(PluginError::PhaseClosed(name));
        }
        if self.has_plugin(&name) || self.inactive.read().contains(&name) {
            return Err(PluginError::AlreadyRegistered(name));
        }

        let active = self
            .services
            .config
            .get_bool(&format!("plugins.{name}.active"), true);
        if !active {
            info!(plugin = %name, "Skipping inactive plugin");
            self.inactive.write().push(name);
            return Ok(Registration::Skipped);
        }

        let namespace = format!("plugins.{name}");
        self.services
            .config
            .register_module_defaults(&namespace, plugin.default_settings());

        let context = PluginContext::new(&name, self.services.clone(), Arc::clone(&self.capabilities));
        let registered = std::panic::catch_unwind(AssertUnwindSafe(|| plugin.register(&context)))
            .unwrap_or_else(|panic| {
                Err(PluginError::Panicked {
                    plugin: name.clone(),
                    phase: PluginPhase::Register,
                    message: shared_types::panic_message(panic.as_ref()),
                })
            });
        if let Err(e) = registered {
            warn!(plugin = %name, error = %e, "Plugin registration failed");
            self.services.config.remove_module_defaults(&namespace);
            return Err(e);
        }

        self.merge_routes(&name, plugin.routes());
        self.merge_tabs(plugin.tabs());
        self.plugins.write().push(Arc::new(PluginEntry {
            plugin,
            context,
            state: Mutex::new(PluginState::Registered),
        }));

        info!(plugin = %name, "Plugin registered");
        Ok(Registration::Registered)
    }

    fn merge_routes(&self, plugin: &str, contributed: Vec<RouteContribution>) {
        let mut routes = self.routes.write();
        for route in contributed {
            match routes.iter_mut().find(|r| r.path == route.path) {
                Some(existing) => {
                    warn!(plugin, path = %route.path, "Route already declared, replacing");
                    *existing = route;
                }
                None => routes.push(route),
            }
        }
    }

    fn merge_tabs(&self, contributed: Vec<TabContribution>) {
        let mut tabs = self.tabs.write();
        tabs.extend(contributed);
        // Stable: equal orders keep registration order.
        tabs.sort_by_key(|t| t.order);
    }

    // =========================================================================
    // BATCH PHASES
    // =========================================================================

    /// Run `init` on every active plugin, in registration order.
    ///
    /// Closes registration.
    pub async fn init_all(&self) -> PhaseOutcome {
        *self.stage.write() = Stage::Initialized;
        let outcome = self.run_batch(PluginPhase::Init, self.snapshot(), None).await;
        log_outcome(&outcome);
        outcome
    }

    /// Run `start` on every active plugin, in registration order.
    ///
    /// Does nothing until `init_all` has run.
    pub async fn start_all(&self) -> PhaseOutcome {
        if *self.stage.read() == Stage::Registering {
            warn!("start_all called before init_all, ignoring");
            return PhaseOutcome::new(PluginPhase::Start);
        }
        *self.stage.write() = Stage::Started;
        let outcome = self.run_batch(PluginPhase::Start, self.snapshot(), None).await;
        log_outcome(&outcome);
        outcome
    }

    /// Deliver a host lifecycle change to every active plugin and mirror it
    /// onto the event bus.
    pub async fn notify_lifecycle_event(&self, state: AppLifecycleState) -> PhaseOutcome {
        let outcome = self.run_batch(PluginPhase::Lifecycle, self.snapshot(), Some(state)).await;
        self.services.events.fire(
            state.event_name(),
            json!({ "state": state }),
            Metadata::new(),
        );
        debug!(?state, failures = outcome.failures.len(), "Lifecycle event delivered");
        outcome
    }

    /// Run `stop` on every active plugin in reverse registration order.
    pub async fn stop_all(&self) -> PhaseOutcome {
        *self.stage.write() = Stage::Stopped;
        let mut entries = self.snapshot();
        entries.reverse();
        let outcome = self.run_batch(PluginPhase::Stop, entries, None).await;
        log_outcome(&outcome);
        outcome
    }

    fn snapshot(&self) -> Vec<Arc<PluginEntry>> {
        self.plugins.read().clone()
    }

    async fn run_batch(
        &self,
        phase: PluginPhase,
        entries: Vec<Arc<PluginEntry>>,
        lifecycle: Option<AppLifecycleState>,
    ) -> PhaseOutcome {
        info!(%phase, plugins = entries.len(), "Phase starting");
        let mut outcome = PhaseOutcome::new(phase);

        for entry in entries {
            let started = Instant::now();
            let result = self.run_hook(&entry, phase, lifecycle).await;
            let elapsed = started.elapsed();
            outcome.timings.push((entry.name().to_string(), elapsed));

            match result {
                Ok(()) => {
                    if let Some((from, to)) = phase.transition() {
                        entry.advance(from, to);
                    }
                    debug!(plugin = entry.name(), %phase, ?elapsed, "Hook finished");
                }
                Err(e) => {
                    warn!(plugin = entry.name(), %phase, error = %e, "Hook failed");
                    outcome.failures.push((entry.name().to_string(), e));
                }
            }
        }
        outcome
    }

    async fn run_hook(
        &self,
        entry: &PluginEntry,
        phase: PluginPhase,
        lifecycle: Option<AppLifecycleState>,
    ) -> Result<(), PluginError> {
        let ctx = &entry.context;
        let hook = match (phase, lifecycle) {
            (PluginPhase::Init, _) => entry.plugin.init(ctx),
            (PluginPhase::Start, _) => entry.plugin.start(ctx),
            (PluginPhase::Stop, _) => entry.plugin.stop(ctx),
            (PluginPhase::Lifecycle, Some(state)) => entry.plugin.on_lifecycle(ctx, state),
            (PluginPhase::Lifecycle, None) | (PluginPhase::Register, _) => return Ok(()),
        };
        let guarded = AssertUnwindSafe(hook).catch_unwind();

        let caught = match self.config.hook_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| PluginError::TimedOut {
                    plugin: entry.name().to_string(),
                    phase,
                    limit,
                })?,
            None => guarded.await,
        };

        caught.unwrap_or_else(|panic| {
            Err(PluginError::Panicked {
                plugin: entry.name().to_string(),
                phase,
                message: shared_types::panic_message(panic.as_ref()),
            })
        })
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Whether `name` is an active, registered plugin.
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.read().iter().any(|e| e.name() == name)
    }

    /// Lifecycle state of `name`; `Unregistered` for unknown or inactive plugins.
    #[must_use]
    pub fn state(&self, name: &str) -> PluginState {
        self.plugins
            .read()
            .iter()
            .find(|e| e.name() == name)
            .map_or(PluginState::Unregistered, |e| *e.state.lock())
    }

    /// Active plugin names in registration order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.read().iter().map(|e| e.name().to_string()).collect()
    }

    /// Plugins left out by configuration.
    #[must_use]
    pub fn inactive_plugins(&self) -> Vec<String> {
        self.inactive.read().clone()
    }

    /// The context handed to `name`'s hooks.
    #[must_use]
    pub fn context(&self, name: &str) -> Option<PluginContext> {
        self.plugins
            .read()
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.context.clone())
    }

    /// Merged route table; later declarations of a path win.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteContribution> {
        self.routes.read().clone()
    }

    /// Merged tabs sorted by `order`.
    #[must_use]
    pub fn tabs(&self) -> Vec<TabContribution> {
        self.tabs.read().clone()
    }

    /// Per-plugin states, keyed by name.
    #[must_use]
    pub fn states(&self) -> HashMap<String, PluginState> {
        self.plugins
            .read()
            .iter()
            .map(|e| (e.name().to_string(), *e.state.lock()))
            .collect()
    }

    /// Forget every plugin and reopen registration. Hooks are not called.
    pub fn clear(&self) {
        self.plugins.write().clear();
        self.inactive.write().clear();
        self.routes.write().clear();
        self.tabs.write().clear();
        *self.stage.write() = Stage::Registering;
    }
}

impl std::fmt::Debug for PluginSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSequencer")
            .field("plugins", &self.plugin_names())
            .field("inactive", &self.inactive_plugins())
            .field("stage", &*self.stage.read())
            .finish()
    }
}

fn log_outcome(outcome: &PhaseOutcome) {
    if outcome.is_success() {
        info!(phase = %outcome.phase, plugins = outcome.timings.len(), "Phase complete");
    } else {
        warn!(
            phase = %outcome.phase,
            plugins = outcome.timings.len(),
            failures = outcome.failures.len(),
            "Phase complete with failures"
        );
    }
}

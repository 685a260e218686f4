//! The plugin contract and the context every hook receives.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared_bus::EventBus;
use shared_config::ConfigResolver;
use shared_hooks::HookRegistry;
use shared_types::{AppLifecycleState, ComponentKey, ConfigTree, RouteContribution, TabContribution};

use crate::capabilities::CapabilityRegistry;
use crate::error::{CapabilityError, PluginError};
use crate::services::Services;
use crate::views::ViewRegistry;

/// Lifecycle of one plugin.
///
/// ```text
/// Unregistered ─► Registered ─► Initialized ─► Started ─► Stopped
/// ```
///
/// A state only advances from its predecessor. A failed hook leaves the state
/// where it was and the failure is reported in the phase outcome; later phases
/// still run that plugin's hooks but never move it forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Unknown, inactive, or rejected during registration.
    Unregistered,
    Registered,
    Initialized,
    Started,
    Stopped,
}

/// The hooks the sequencer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginPhase {
    Register,
    Init,
    Start,
    Lifecycle,
    Stop,
}

impl PluginPhase {
    /// The `(from, to)` move a successful hook of this phase makes.
    #[must_use]
    pub fn transition(self) -> Option<(PluginState, PluginState)> {
        match self {
            Self::Register => Some((PluginState::Unregistered, PluginState::Registered)),
            Self::Init => Some((PluginState::Registered, PluginState::Initialized)),
            Self::Start => Some((PluginState::Initialized, PluginState::Started)),
            Self::Stop => Some((PluginState::Started, PluginState::Stopped)),
            Self::Lifecycle => None,
        }
    }
}

impl fmt::Display for PluginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register => "register",
            Self::Init => "init",
            Self::Start => "start",
            Self::Lifecycle => "lifecycle",
            Self::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// A feature module.
///
/// Every hook has a no-op default, so a plugin implements only what it needs.
/// `register` is synchronous and is where a plugin wires itself into hooks,
/// events, views and capabilities. `start` may assume every other active
/// plugin has finished `init`.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; also its configuration key under `plugins`.
    fn name(&self) -> &str;

    /// Defaults merged under `plugins.<name>` before `register` runs, and
    /// dropped again if `register` fails.
    fn default_settings(&self) -> ConfigTree {
        ConfigTree::new()
    }

    /// Routes merged into the application route table.
    fn routes(&self) -> Vec<RouteContribution> {
        Vec::new()
    }

    /// Navigation tabs merged into the application tab bar.
    fn tabs(&self) -> Vec<TabContribution> {
        Vec::new()
    }

    fn register(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    async fn init(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Host application lifecycle change. Best effort.
    async fn on_lifecycle(
        &self,
        _ctx: &PluginContext,
        _state: AppLifecycleState,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    async fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Services injected into a plugin.
///
/// Created once per plugin before its first hook and passed to every hook.
#[derive(Clone)]
pub struct PluginContext {
    name: Arc<str>,
    services: Services,
    capabilities: Arc<CapabilityRegistry>,
}

impl PluginContext {
    pub(crate) fn new(name: &str, services: Services, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            name: Arc::from(name),
            services,
            capabilities,
        }
    }

    /// The plugin this context belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &Arc<ConfigResolver> {
        &self.services.config
    }

    #[must_use]
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.services.hooks
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.services.events
    }

    #[must_use]
    pub fn views(&self) -> &Arc<ViewRegistry> {
        &self.services.views
    }

    #[must_use]
    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// Resolve a capability.
    pub fn get<T>(&self) -> Result<Arc<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.capabilities.get::<T>()
    }

    /// This plugin's settings: defaults underneath, configured values on top.
    #[must_use]
    pub fn settings(&self) -> ConfigTree {
        self.services
            .config
            .section(&ComponentKey::plugin(self.name()).config_path())
    }

    /// One setting of this plugin, e.g. `setting("page_size", 20)`.
    pub fn setting<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let path = format!("{}.{}", ComponentKey::plugin(self.name()).config_path(), key);
        self.services.config.get_as(&path, fallback)
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext").field("plugin", &self.name).finish()
    }
}

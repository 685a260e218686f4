//! # Composition Root
//!
//! One [`AppContext`] owns exactly one instance of every registry. Nothing
//! is process-global: two contexts built side by side share nothing, which
//! is what lets tests run in parallel.
//!
//! Every constructor argument can be overridden through [`AppContextBuilder`].

use std::sync::Arc;

use shared_bus::EventBus;
use shared_config::{BasicSchemaValidator, ConfigResolver, SchemaValidator};
use shared_hooks::HookRegistry;
use tracing::info;

use crate::capabilities::CapabilityRegistry;
use crate::error::CapabilityError;
use crate::plugins::{PhaseOutcome, PluginSequencer, SequencerConfig};
use crate::services::Services;
use crate::views::ViewRegistry;

/// The per-run container owning every registry.
pub struct AppContext {
    services: Services,
    capabilities: Arc<CapabilityRegistry>,
    plugins: Arc<PluginSequencer>,
}

impl AppContext {
    /// A context with fresh default registries.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
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

    #[must_use]
    pub fn plugins(&self) -> &Arc<PluginSequencer> {
        &self.plugins
    }

    /// Resolve a capability through a synchronous factory.
    pub fn get<T>(&self) -> Result<Arc<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.capabilities.get::<T>()
    }

    /// Resolve a capability through either kind of factory.
    pub async fn get_async<T>(&self) -> Result<Arc<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.capabilities.get_async::<T>().await
    }

    /// Whether `name` is an active, registered plugin.
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.has_plugin(name)
    }

    /// Tear every registry down.
    ///
    /// The bus is disposed, so the context is not reusable for events
    /// afterwards. Plugin stop hooks are not called; use [`Self::shutdown`].
    pub fn reset(&self) {
        self.services.events.dispose();
        self.capabilities.reset();
        self.services.hooks.clear_all();
        self.services.views.clear();
        self.plugins.clear();
        self.services.config.reset_defaults();
        info!("Application context reset");
    }

    /// Stop every plugin in reverse registration order, then reset.
    pub async fn shutdown(&self) -> PhaseOutcome {
        info!("Shutting down application context");
        let outcome = self.plugins.stop_all().await;
        self.reset();
        outcome
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("capabilities", &self.capabilities)
            .field("plugins", &self.plugins)
            .finish()
    }
}

/// Overrides for the registries of an [`AppContext`].
#[derive(Default)]
pub struct AppContextBuilder {
    config: Option<Arc<ConfigResolver>>,
    hooks: Option<Arc<HookRegistry>>,
    events: Option<Arc<EventBus>>,
    views: Option<Arc<ViewRegistry>>,
    validator: Option<Arc<dyn SchemaValidator>>,
    sequencer: SequencerConfig,
}

impl AppContextBuilder {
    #[must_use]
    pub fn config(mut self, config: Arc<ConfigResolver>) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn views(mut self, views: Arc<ViewRegistry>) -> Self {
        self.views = Some(views);
        self
    }

    /// Validator used for capability-module configuration slices.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn sequencer(mut self, config: SequencerConfig) -> Self {
        self.sequencer = config;
        self
    }

    #[must_use]
    pub fn build(self) -> AppContext {
        let services = Services::new(
            self.config.unwrap_or_default(),
            self.hooks.unwrap_or_default(),
            self.events.unwrap_or_default(),
            self.views.unwrap_or_default(),
        );
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(BasicSchemaValidator));
        let capabilities = Arc::new(CapabilityRegistry::new(services.clone(), validator));
        let plugins = Arc::new(PluginSequencer::new(
            services.clone(),
            Arc::clone(&capabilities),
            self.sequencer,
        ));

        AppContext {
            services,
            capabilities,
            plugins,
        }
    }
}

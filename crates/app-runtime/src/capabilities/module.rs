//! Capability modules: backend-integration units that, given validated
//! configuration, register capability factories.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::EventBus;
use shared_config::{ConfigResolver, ConfigSchema};
use shared_hooks::HookRegistry;
use shared_types::ConfigTree;

use super::factory::{erase_async, CapabilityFactory, CapabilityKey, Factory};
use super::registry::CapabilityRegistry;
use crate::error::{CapabilityError, ModuleError};
use crate::services::Services;
use crate::views::ViewRegistry;

/// A backend-integration module.
///
/// Its configuration slice lives at `adapters.<name>`. When the module
/// declares a schema the slice is validated first, and `initialize` only
/// runs if validation passes.
pub trait CapabilityModule: Send + Sync {
    /// Unique module name.
    fn name(&self) -> &str;

    /// Schema for the module's configuration slice.
    fn schema(&self) -> Option<ConfigSchema> {
        None
    }

    /// Register this module's capability factories.
    fn initialize(&self, ctx: &ModuleContext<'_>, config: &ConfigTree) -> Result<(), ModuleError>;
}

/// Services handed to a module during `initialize`.
///
/// Factories registered through the context are staged and only installed
/// once `initialize` returns `Ok`. A failing module leaves the registry as
/// it found it.
pub struct ModuleContext<'a> {
    name: &'a str,
    services: &'a Services,
    capabilities: &'a CapabilityRegistry,
    staged: Mutex<Vec<(CapabilityKey, Factory)>>,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        name: &'a str,
        services: &'a Services,
        capabilities: &'a CapabilityRegistry,
    ) -> Self {
        Self {
            name,
            services,
            capabilities,
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Factories registered so far, in registration order.
    pub(crate) fn into_staged(self) -> Vec<(CapabilityKey, Factory)> {
        self.staged.into_inner()
    }

    fn stage(&self, key: CapabilityKey, factory: Factory) {
        self.staged.lock().push((key, factory));
    }

    /// The module being initialized.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
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
    pub fn capabilities(&self) -> &CapabilityRegistry {
        self.capabilities
    }

    /// Stage a synchronous factory for `T`.
    pub fn register<T, F>(&self, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&CapabilityRegistry) -> Result<Arc<T>, CapabilityError> + Send + Sync + 'static,
    {
        self.register_factory(CapabilityFactory::new(build));
    }

    /// Stage a factory that carries an init hook.
    pub fn register_factory<T>(&self, factory: CapabilityFactory<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.stage(CapabilityKey::of::<T>(), Factory::sync(factory.erase()));
    }

    /// Stage an asynchronous factory for `T`.
    pub fn register_async<T, F, Fut>(&self, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, CapabilityError>> + Send + 'static,
    {
        self.stage(
            CapabilityKey::of::<T>(),
            Factory::asynchronous(erase_async::<T, F, Fut>(build)),
        );
    }

    /// An initialization failure attributed to this module.
    #[must_use]
    pub fn error(&self, reason: impl Into<String>) -> ModuleError {
        ModuleError::initialize(self.name, reason)
    }
}

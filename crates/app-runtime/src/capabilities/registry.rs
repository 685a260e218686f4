//! # Capability Registry
//!
//! Type-keyed, lazily-built, at-most-once capability cache.
//!
//! ## Binding States
//!
//! ```text
//!   Unregistered ──register──► Registered ──get──► Building ──ok──► Cached
//!                                  ▲                  │               │
//!                                  └──────err─────────┘               │
//!                                  └──────────clear_cache─────────────┘
//! ```
//!
//! Each binding has its own re-entrant lock. Resolution holds it from the
//! cache miss until the cache fill, so concurrent resolvers of one type
//! share a single instance while a factory may still resolve other types
//! (and a factory that resolves its own type is reported, not deadlocked).

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use shared_config::{BasicSchemaValidator, ConfigError, SchemaValidator};
use shared_types::ComponentKey;
use tracing::{debug, info, warn};

use super::factory::{
    downcast, erase_async, erase_dyn, CapabilityFactory, CapabilityKey, DynFactory, Factory,
    Instance, SyncBuild,
};
use super::module::{CapabilityModule, ModuleContext};
use crate::error::{CapabilityError, ModuleError};
use crate::services::Services;

/// Externally visible state of one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    /// No factory has been registered.
    Unregistered,
    /// A factory exists but no instance has been built.
    Registered,
    /// An instance is cached.
    Cached,
}

enum Slot {
    Unregistered,
    Registered(Factory),
    /// A factory is running on the thread holding the binding lock.
    Building(Factory),
    Cached {
        factory: Factory,
        instance: Instance,
    },
}

impl Slot {
    fn take(&mut self) -> Self {
        std::mem::replace(self, Self::Unregistered)
    }

    fn into_factory(self) -> Option<Factory> {
        match self {
            Self::Unregistered => None,
            Self::Registered(factory) | Self::Building(factory) => Some(factory),
            Self::Cached { factory, .. } => Some(factory),
        }
    }

    fn state(&self) -> CapabilityState {
        match self {
            Self::Unregistered => CapabilityState::Unregistered,
            Self::Registered(_) | Self::Building(_) => CapabilityState::Registered,
            Self::Cached { .. } => CapabilityState::Cached,
        }
    }
}

struct Binding {
    key: CapabilityKey,
    slot: ReentrantMutex<RefCell<Slot>>,
}

impl Binding {
    fn new(key: CapabilityKey) -> Self {
        Self {
            key,
            slot: ReentrantMutex::new(RefCell::new(Slot::Unregistered)),
        }
    }
}

struct ModuleRecord {
    module: Arc<dyn CapabilityModule>,
    initialized: bool,
}

/// What the synchronous path found in a slot.
enum Lookup {
    Hit(Instance),
    Build(SyncBuild),
}

/// Manages capability modules and resolves capabilities by type.
pub struct CapabilityRegistry {
    services: Services,
    validator: Arc<dyn SchemaValidator>,
    bindings: RwLock<HashMap<TypeId, Arc<Binding>>>,
    modules: Mutex<Vec<ModuleRecord>>,
}

impl CapabilityRegistry {
    /// Create a registry whose modules see `services` and are validated by
    /// `validator`.
    #[must_use]
    pub fn new(services: Services, validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            services,
            validator,
            bindings: RwLock::new(HashMap::new()),
            modules: Mutex::new(Vec::new()),
        }
    }

    /// Services handed to modules.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    // =========================================================================
    // MODULES
    // =========================================================================

    /// Register a capability module.
    ///
    /// With `auto_init` the module's configuration slice is validated and
    /// `initialize` is called at once; on failure the module is dropped and
    /// the error returned. Without it the module waits for
    /// [`CapabilityRegistry::initialize_pending`].
    pub fn register_module(
        &self,
        module: Arc<dyn CapabilityModule>,
        auto_init: bool,
    ) -> Result<(), ModuleError> {
        let name = module.name().to_string();
        {
            let mut modules = self.modules.lock();
            if modules.iter().any(|r| r.module.name() == name) {
                return Err(ModuleError::AlreadyRegistered(name));
            }
            modules.push(ModuleRecord {
                module: Arc::clone(&module),
                initialized: false,
            });
        }

        if !auto_init {
            info!(module = %name, "Capability module registered (deferred)");
            return Ok(());
        }

        match self.initialize_module(module.as_ref()) {
            Ok(()) => {
                self.mark_initialized(&name);
                info!(module = %name, "Capability module registered");
                Ok(())
            }
            Err(e) => {
                self.modules.lock().retain(|r| r.module.name() != name);
                warn!(module = %name, error = %e, "Capability module rejected");
                Err(e)
            }
        }
    }

    /// Initialize every module registered without `auto_init`.
    ///
    /// Failed modules stay pending and are returned with their errors.
    pub fn initialize_pending(&self) -> Vec<(String, ModuleError)> {
        let pending: Vec<Arc<dyn CapabilityModule>> = self
            .modules
            .lock()
            .iter()
            .filter(|r| !r.initialized)
            .map(|r| Arc::clone(&r.module))
            .collect();

        let mut failures = Vec::new();
        for module in pending {
            let name = module.name().to_string();
            match self.initialize_module(module.as_ref()) {
                Ok(()) => {
                    self.mark_initialized(&name);
                    info!(module = %name, "Deferred capability module initialized");
                }
                Err(e) => {
                    warn!(module = %name, error = %e, "Deferred capability module failed");
                    failures.push((name, e));
                }
            }
        }
        failures
    }

    /// Whether a module named `name` is registered.
    #[must_use]
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.lock().iter().any(|r| r.module.name() == name)
    }

    /// Whether the module named `name` has been initialized.
    #[must_use]
    pub fn is_module_initialized(&self, name: &str) -> bool {
        self.modules
            .lock()
            .iter()
            .any(|r| r.module.name() == name && r.initialized)
    }

    /// Registered module names in registration order.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .lock()
            .iter()
            .map(|r| r.module.name().to_string())
            .collect()
    }

    fn mark_initialized(&self, name: &str) {
        if let Some(record) = self
            .modules
            .lock()
            .iter_mut()
            .find(|r| r.module.name() == name)
        {
            record.initialized = true;
        }
    }

    fn initialize_module(&self, module: &dyn CapabilityModule) -> Result<(), ModuleError> {
        let name = module.name();
        let config = self
            .services
            .config
            .section(&ComponentKey::adapter(name).config_path());

        if let Some(schema) = module.schema() {
            self.validator
                .validate(&schema, &Value::Object(config.clone()))
                .map_err(|report| ModuleError::Config {
                    module: name.to_string(),
                    source: ConfigError::Validation(report),
                })?;
        }

        let ctx = ModuleContext::new(name, &self.services, self);
        catch_unwind(AssertUnwindSafe(|| module.initialize(&ctx, &config))).unwrap_or_else(
            |panic| {
                Err(ModuleError::Panicked {
                    module: name.to_string(),
                    message: shared_types::panic_message(panic.as_ref()),
                })
            },
        )?;

        let staged = ctx.into_staged();
        debug!(module = name, factories = staged.len(), "Installing module factories");
        for (key, factory) in staged {
            self.install(key, factory);
        }
        Ok(())
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register a synchronous factory for `T`.
    ///
    /// The most recent registration builds the next instance. An instance
    /// already cached from an earlier factory is kept until the cache is
    /// cleared.
    pub fn register<T, F>(&self, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&CapabilityRegistry) -> Result<Arc<T>, CapabilityError> + Send + Sync + 'static,
    {
        self.register_factory(CapabilityFactory::new(build));
    }

    /// Register a synchronous factory that may carry an init hook.
    pub fn register_factory<T>(&self, factory: CapabilityFactory<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.install(CapabilityKey::of::<T>(), Factory::sync(factory.erase()));
    }

    /// Register an asynchronous factory for `T`.
    ///
    /// Only [`CapabilityRegistry::get_async`] can resolve it.
    pub fn register_async<T, F, Fut>(&self, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, CapabilityError>> + Send + 'static,
    {
        self.install(
            CapabilityKey::of::<T>(),
            Factory::asynchronous(erase_async::<T, F, Fut>(build)),
        );
    }

    /// Register a type-erased factory under `key`.
    ///
    /// The factory's output is only checked when the capability is resolved.
    pub fn register_dyn(&self, key: CapabilityKey, factory: DynFactory) {
        self.install(key, Factory::sync(erase_dyn(factory)));
    }

    fn install(&self, key: CapabilityKey, factory: Factory) {
        let binding = Arc::clone(
            self.bindings
                .write()
                .entry(key.id())
                .or_insert_with(|| Arc::new(Binding::new(key))),
        );
        let is_async = factory.is_async();

        let guard = binding.slot.lock();
        let mut slot = guard.borrow_mut();
        *slot = match slot.take() {
            Slot::Unregistered | Slot::Registered(_) => Slot::Registered(factory),
            Slot::Building(_) => Slot::Building(factory),
            Slot::Cached { instance, .. } => {
                debug!(capability = key.type_name(), "Factory replaced, cached instance kept");
                Slot::Cached { factory, instance }
            }
        };
        info!(capability = key.type_name(), is_async, "Capability factory registered");
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Resolve `T`, building and caching it on first use.
    pub fn get<T>(&self) -> Result<Arc<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = CapabilityKey::of::<T>();
        let binding = self.binding(&key)?;
        let guard = binding.slot.lock();

        let lookup = {
            let slot = guard.borrow();
            match &*slot {
                Slot::Unregistered => return Err(not_registered(&key)),
                Slot::Cached { instance, .. } => Lookup::Hit(Arc::clone(instance)),
                Slot::Building(_) => {
                    return Err(CapabilityError::CircularDependency {
                        type_name: key.type_name(),
                    })
                }
                Slot::Registered(Factory::Async { .. }) => {
                    return Err(CapabilityError::SyncAsyncMismatch {
                        type_name: key.type_name(),
                    })
                }
                Slot::Registered(Factory::Sync(build)) => Lookup::Build(Arc::clone(build)),
            }
        };
        let build = match lookup {
            Lookup::Hit(instance) => return downcast::<T>(&instance),
            Lookup::Build(build) => build,
        };

        {
            let mut slot = guard.borrow_mut();
            if let Some(factory) = slot.take().into_factory() {
                *slot = Slot::Building(factory);
            }
        }

        debug!(capability = key.type_name(), "Building capability");
        let built = catch_unwind(AssertUnwindSafe(|| build(self))).unwrap_or_else(|panic| {
            Err(CapabilityError::FactoryFailed {
                type_name: key.type_name(),
                reason: shared_types::panic_message(panic.as_ref()),
            })
        });
        let resolved = built.and_then(|instance| downcast::<T>(&instance).map(|typed| (instance, typed)));

        let mut slot = guard.borrow_mut();
        let factory = slot.take().into_factory();
        match (resolved, factory) {
            (Ok((instance, typed)), Some(factory)) => {
                *slot = Slot::Cached { factory, instance };
                Ok(typed)
            }
            (Ok((_, typed)), None) => Ok(typed),
            (Err(e), factory) => {
                if let Some(factory) = factory {
                    *slot = Slot::Registered(factory);
                }
                warn!(capability = key.type_name(), error = %e, "Capability build failed");
                Err(e)
            }
        }
    }

    /// Resolve `T` through either a synchronous or an asynchronous factory.
    ///
    /// Concurrent callers of an async binding share one in-flight build.
    pub async fn get_async<T>(&self) -> Result<Arc<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = CapabilityKey::of::<T>();
        let binding = self.binding(&key)?;

        let pending = {
            let guard = binding.slot.lock();
            let slot = guard.borrow();
            match &*slot {
                Slot::Unregistered => return Err(not_registered(&key)),
                Slot::Cached { instance, .. } => return downcast::<T>(instance),
                Slot::Building(_) => {
                    return Err(CapabilityError::CircularDependency {
                        type_name: key.type_name(),
                    })
                }
                Slot::Registered(Factory::Sync(_)) => None,
                Slot::Registered(Factory::Async { build, cell }) => {
                    Some((Arc::clone(build), Arc::clone(cell)))
                }
            }
        };
        let Some((build, cell)) = pending else {
            return self.get::<T>();
        };

        debug!(capability = key.type_name(), "Building capability asynchronously");
        let instance = Arc::clone(cell.get_or_try_init(|| build()).await?);
        let typed = downcast::<T>(&instance)?;

        let guard = binding.slot.lock();
        let mut slot = guard.borrow_mut();
        let still_current = matches!(
            &*slot,
            Slot::Registered(Factory::Async { cell: current, .. }) if Arc::ptr_eq(current, &cell)
        );
        if still_current {
            if let Some(factory) = slot.take().into_factory() {
                *slot = Slot::Cached { factory, instance };
            }
        }
        Ok(typed)
    }

    fn binding(&self, key: &CapabilityKey) -> Result<Arc<Binding>, CapabilityError> {
        self.bindings
            .read()
            .get(&key.id())
            .cloned()
            .ok_or_else(|| not_registered(key))
    }

    // =========================================================================
    // INSPECTION AND TEARDOWN
    // =========================================================================

    /// State of the binding for `T`.
    #[must_use]
    pub fn state<T: ?Sized + 'static>(&self) -> CapabilityState {
        let Ok(binding) = self.binding(&CapabilityKey::of::<T>()) else {
            return CapabilityState::Unregistered;
        };
        // Another thread is building it.
        let Some(guard) = binding.slot.try_lock() else {
            return CapabilityState::Registered;
        };
        let state = guard.borrow().state();
        state
    }

    /// Whether a factory for `T` exists.
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.state::<T>() != CapabilityState::Unregistered
    }

    /// Type names of every registered capability, sorted.
    #[must_use]
    pub fn capability_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .bindings
            .read()
            .values()
            .map(|b| b.key.type_name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Drop every cached instance, keeping factories.
    pub fn clear_cache(&self) {
        let bindings: Vec<Arc<Binding>> = self.bindings.read().values().cloned().collect();
        let mut cleared = 0;
        for binding in bindings {
            let guard = binding.slot.lock();
            let mut slot = guard.borrow_mut();
            *slot = match slot.take() {
                Slot::Cached { factory, .. } => {
                    cleared += 1;
                    Slot::Registered(factory.fresh())
                }
                Slot::Registered(factory) => Slot::Registered(factory.fresh()),
                other => other,
            };
        }
        info!(cleared, "Capability cache cleared");
    }

    /// Drop every factory, instance and module record.
    pub fn reset(&self) {
        let bindings = {
            let mut map = self.bindings.write();
            let count = map.len();
            map.clear();
            count
        };
        let modules = {
            let mut records = self.modules.lock();
            let count = records.len();
            records.clear();
            count
        };
        info!(bindings, modules, "Capability registry reset");
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new(Services::default(), Arc::new(BasicSchemaValidator))
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capability_names())
            .field("modules", &self.module_names())
            .finish()
    }
}

fn not_registered(key: &CapabilityKey) -> CapabilityError {
    CapabilityError::NotRegistered {
        type_name: key.type_name(),
    }
}

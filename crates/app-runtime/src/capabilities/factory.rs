//! Capability factories and their type-erased storage form.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::OnceCell;

use super::registry::CapabilityRegistry;
use crate::error::{BoxError, CapabilityError};

/// A cached instance: an `Arc<T>` behind `Any`.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Builds an erased capability. The boxed value must be an `Arc<T>` for the
/// key's `T`; anything else fails resolution with a type mismatch.
pub type DynFactory =
    Arc<dyn Fn(&CapabilityRegistry) -> Result<Box<dyn Any + Send + Sync>, CapabilityError> + Send + Sync>;

pub(crate) type SyncBuild = Arc<dyn Fn(&CapabilityRegistry) -> Result<Instance, CapabilityError> + Send + Sync>;
pub(crate) type AsyncBuild = Arc<dyn Fn() -> BoxFuture<'static, Result<Instance, CapabilityError>> + Send + Sync>;

type BuildFn<T> = dyn Fn(&CapabilityRegistry) -> Result<Arc<T>, CapabilityError> + Send + Sync;
type InitFn<T> = dyn Fn(&T) -> Result<(), BoxError> + Send + Sync;

/// Type token identifying one capability binding.
#[derive(Clone, Copy)]
pub struct CapabilityKey {
    id: TypeId,
    name: &'static str,
}

impl CapabilityKey {
    /// The key for `T`, which is usually a trait object type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub(crate) fn id(&self) -> TypeId {
        self.id
    }

    /// Readable type name, for diagnostics only.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for CapabilityKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CapabilityKey {}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A synchronous factory for `T` with an optional init hook.
///
/// The hook runs once, right after construction and before the instance is
/// cached. If it fails nothing is cached and the next resolution builds again.
pub struct CapabilityFactory<T: ?Sized> {
    build: Arc<BuildFn<T>>,
    on_init: Option<Arc<InitFn<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> CapabilityFactory<T> {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&CapabilityRegistry) -> Result<Arc<T>, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
            on_init: None,
        }
    }

    #[must_use]
    pub fn with_init<F>(mut self, on_init: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(on_init));
        self
    }

    pub(crate) fn erase(self) -> SyncBuild {
        let Self { build, on_init } = self;
        Arc::new(move |registry: &CapabilityRegistry| {
            let instance = build(registry)?;
            if let Some(init) = &on_init {
                init(&*instance).map_err(|e| CapabilityError::InitFailed {
                    type_name: type_name::<T>(),
                    reason: e.to_string(),
                })?;
            }
            Ok(Arc::new(instance) as Instance)
        })
    }
}

impl<T: ?Sized> fmt::Debug for CapabilityFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityFactory")
            .field("type", &type_name::<T>())
            .field("has_init", &self.on_init.is_some())
            .finish()
    }
}

pub(crate) fn erase_dyn(factory: DynFactory) -> SyncBuild {
    Arc::new(move |registry: &CapabilityRegistry| factory(registry).map(Instance::from))
}

pub(crate) fn erase_async<T, F, Fut>(build: F) -> AsyncBuild
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Arc<T>, CapabilityError>> + Send + 'static,
{
    Arc::new(move || {
        build()
            .map(|result| result.map(|instance| Arc::new(instance) as Instance))
            .boxed()
    })
}

/// How a binding builds its instance.
#[derive(Clone)]
pub(crate) enum Factory {
    Sync(SyncBuild),
    /// Concurrent async resolvers share `cell`, so only one build runs.
    Async {
        build: AsyncBuild,
        cell: Arc<OnceCell<Instance>>,
    },
}

impl Factory {
    pub(crate) fn sync(build: SyncBuild) -> Self {
        Self::Sync(build)
    }

    pub(crate) fn asynchronous(build: AsyncBuild) -> Self {
        Self::Async {
            build,
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Same build function with no in-flight or finished async result.
    pub(crate) fn fresh(&self) -> Self {
        match self {
            Self::Sync(build) => Self::Sync(Arc::clone(build)),
            Self::Async { build, .. } => Self::asynchronous(Arc::clone(build)),
        }
    }

    pub(crate) fn is_async(&self) -> bool {
        matches!(self, Self::Async { .. })
    }
}

/// Downcast a cached instance back to `Arc<T>`.
pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    instance: &Instance,
) -> Result<Arc<T>, CapabilityError> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(CapabilityError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

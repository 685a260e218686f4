//! # View Registry
//!
//! String-keyed builder callbacks supplied by plugins. The runtime never
//! renders anything; it stores builders and invokes the one requested,
//! forwarding whatever data and handlers the caller passed in.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ViewError;

/// Callback a view may invoke, e.g. on a button press.
pub type ViewHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// A built view, opaque to the runtime.
pub type BuiltView = Box<dyn Any + Send>;

type Builder = Arc<dyn Fn(&ViewProps) -> BuiltView + Send + Sync>;

/// Caller-supplied input forwarded to a builder.
#[derive(Clone, Default)]
pub struct ViewProps {
    /// Arbitrary data.
    pub data: Value,
    /// Named callbacks.
    pub handlers: HashMap<String, ViewHandler>,
}

impl ViewProps {
    /// Props carrying `data` and no handlers.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            handlers: HashMap::new(),
        }
    }

    /// Attach a named handler.
    #[must_use]
    pub fn with_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Invoke the named handler if present. Returns whether it existed.
    pub fn emit(&self, name: &str, payload: Value) -> bool {
        match self.handlers.get(name) {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ViewProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&String> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("ViewProps")
            .field("data", &self.data)
            .field("handlers", &handlers)
            .finish()
    }
}

/// Registry of named view builders.
#[derive(Default)]
pub struct ViewRegistry {
    builders: RwLock<HashMap<String, Builder>>,
}

impl ViewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `builder` under `name`. A later registration replaces it.
    pub fn register<V, F>(&self, name: &str, builder: F)
    where
        V: Any + Send,
        F: Fn(&ViewProps) -> V + Send + Sync + 'static,
    {
        let erased: Builder = Arc::new(move |props: &ViewProps| Box::new(builder(props)) as BuiltView);
        if self.builders.write().insert(name.to_string(), erased).is_some() {
            warn!(view = name, "View builder replaced");
        } else {
            debug!(view = name, view_type = type_name::<V>(), "View builder registered");
        }
    }

    /// Build the view registered under `name`.
    pub fn build(&self, name: &str, props: &ViewProps) -> Result<BuiltView, ViewError> {
        let builder = self
            .builders
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        Ok(builder(props))
    }

    /// Build the view under `name` and downcast it to `V`.
    pub fn build_as<V: Any>(&self, name: &str, props: &ViewProps) -> Result<V, ViewError> {
        self.build(name, props)?
            .downcast::<V>()
            .map(|view| *view)
            .map_err(|_| ViewError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<V>(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.builders.read().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.builders.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.builders.write().clear();
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("views", &self.names())
            .finish()
    }
}

//! # Configuration Resolver
//!
//! Three-tier lookup over the raw tree, the defaults layer, and a
//! caller-supplied fallback.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::{deep_merge, lookup, merge_at, remove_at, split_path, ConfigTree};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Resolves dotted or colon-separated paths against layered configuration.
///
/// One resolver is owned by each composition root. The raw tree is replaced
/// wholesale by [`ConfigResolver::initialize`]; the defaults layer only ever
/// grows through [`ConfigResolver::register_module_defaults`] until
/// [`ConfigResolver::reset_defaults`] is called during teardown.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Raw configuration as loaded by the bootstrapper.
    raw: RwLock<ConfigTree>,
    /// Per-module defaults, merged additively.
    defaults: RwLock<ConfigTree>,
}

impl ConfigResolver {
    /// Create a resolver with an empty raw tree and no defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver already holding `tree`.
    #[must_use]
    pub fn with_tree(tree: ConfigTree) -> Self {
        Self {
            raw: RwLock::new(tree),
            defaults: RwLock::new(ConfigTree::new()),
        }
    }

    /// Replace the raw tree wholesale. The defaults layer is untouched.
    pub fn initialize(&self, tree: ConfigTree) {
        debug!(keys = tree.len(), "Configuration tree initialized");
        *self.raw.write() = tree;
    }

    /// Resolve `path` through the raw tree and then the defaults layer.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let segments = split_path(path);
        if let Some(value) = lookup(&self.raw.read(), &segments) {
            return Some(value.clone());
        }
        lookup(&self.defaults.read(), &segments).cloned()
    }

    /// Resolve `path`, returning `fallback` when both layers miss.
    #[must_use]
    pub fn get_or(&self, path: &str, fallback: Value) -> Value {
        self.get(path).unwrap_or(fallback)
    }

    /// Resolve `path` and deserialize it as `T`.
    ///
    /// A value that exists but does not deserialize is treated as a miss and
    /// logged, so the fallback is returned.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str, fallback: T) -> T {
        match self.try_get_as(path) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(e) => {
                warn!(path, error = %e, "Configuration value has the wrong shape, using fallback");
                fallback
            }
        }
    }

    /// Resolve `path` and deserialize it as `T`, surfacing shape errors.
    pub fn try_get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get(path) else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Read a boolean flag, accepting JSON booleans and the strings
    /// `"true"`/`"false"`/`"1"`/`"0"`.
    #[must_use]
    pub fn get_bool(&self, path: &str, fallback: bool) -> bool {
        match self.get(path) {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => fallback,
            },
            Some(Value::Number(n)) => n.as_i64().map_or(fallback, |n| n != 0),
            _ => fallback,
        }
    }

    /// Whether `path` exists in the raw tree. The defaults layer is ignored.
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        lookup(&self.raw.read(), &split_path(path)).is_some()
    }

    /// The map at `path` with defaults underneath and raw values on top.
    ///
    /// Returns an empty map when neither layer has a map there.
    #[must_use]
    pub fn section(&self, path: &str) -> ConfigTree {
        let segments = split_path(path);
        let mut merged = lookup(&self.defaults.read(), &segments)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(raw) = lookup(&self.raw.read(), &segments).and_then(Value::as_object) {
            deep_merge(&mut merged, raw.clone());
        }
        merged
    }

    /// Merge `defaults` into the defaults layer under `namespace`.
    ///
    /// The namespace is itself a path, so `"plugins.auth"` lands the defaults
    /// at `plugins → auth`. The raw tree is never modified.
    pub fn register_module_defaults(&self, namespace: &str, defaults: ConfigTree) {
        if defaults.is_empty() {
            return;
        }
        let segments = split_path(namespace);
        merge_at(&mut self.defaults.write(), &segments, defaults);
        debug!(namespace, "Module defaults registered");
    }

    /// Drop everything the defaults layer holds under `namespace`.
    ///
    /// Returns whether anything was removed. The raw tree is never modified.
    pub fn remove_module_defaults(&self, namespace: &str) -> bool {
        let segments = split_path(namespace);
        let removed = remove_at(&mut self.defaults.write(), &segments).is_some();
        if removed {
            debug!(namespace, "Module defaults removed");
        }
        removed
    }

    /// Snapshot of the raw tree.
    #[must_use]
    pub fn raw(&self) -> ConfigTree {
        self.raw.read().clone()
    }

    /// Snapshot of the defaults layer.
    #[must_use]
    pub fn defaults(&self) -> ConfigTree {
        self.defaults.read().clone()
    }

    /// Drop every registered default.
    pub fn reset_defaults(&self) {
        self.defaults.write().clear();
    }
}

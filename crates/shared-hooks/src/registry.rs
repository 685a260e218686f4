//! Hook registry: named pipelines of typed callbacks.
//!
//! Callbacks are stored type-erased so one registry can serve hook points of
//! any value type. A callback registered for `T` only ever sees `T`; when a
//! point is executed with a different type the callback is skipped.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::panic_message;
use thiserror::Error;
use tracing::{debug, warn};

/// Error a callback returns to signal it could not transform its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The callback rejected its input.
    #[error("hook rejected input: {0}")]
    Rejected(String),

    /// The callback failed for another reason.
    #[error("hook failed: {0}")]
    Failed(String),
}

impl HookError {
    /// Shorthand for [`HookError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Result type returned by hook callbacks.
pub type HookResult<T> = Result<T, HookError>;

/// Handle identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

type Payload = Box<dyn Any + Send>;

/// Why an erased callback produced no value.
enum Outcome {
    TypeMismatch { expected: &'static str },
    Failed(HookError),
}

type ErasedCallback = Arc<dyn Fn(Payload) -> Result<Payload, Outcome> + Send + Sync>;

/// A registered callback with its ordering key.
#[derive(Clone)]
struct RegisteredHook {
    id: HookId,
    priority: i32,
    callback: ErasedCallback,
}

/// Central registry of hook points.
///
/// Owned by one composition root. Registration and execution both take
/// `&self`; the callback list is snapshotted before execution so a callback
/// may itself register or unregister hooks without deadlocking.
pub struct HookRegistry {
    points: RwLock<HashMap<String, Vec<RegisteredHook>>>,
    next_id: AtomicU64,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            points: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` on `point` with the given priority.
    ///
    /// Higher priorities run first. Callbacks with equal priority run in the
    /// order they were registered.
    pub fn register<T, F>(&self, point: &str, priority: i32, callback: F) -> HookId
    where
        T: Send + 'static,
        F: Fn(T) -> HookResult<T> + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let erased: ErasedCallback = Arc::new(move |payload: Payload| {
            let input = payload.downcast::<T>().map_err(|_| Outcome::TypeMismatch {
                expected: type_name::<T>(),
            })?;
            callback(*input)
                .map(|out| Box::new(out) as Payload)
                .map_err(Outcome::Failed)
        });

        let mut points = self.points.write();
        let hooks = points.entry(point.to_string()).or_default();

        // Insert after every hook of greater or equal priority (stable)
        let pos = hooks
            .iter()
            .position(|h| h.priority < priority)
            .unwrap_or(hooks.len());
        hooks.insert(
            pos,
            RegisteredHook {
                id,
                priority,
                callback: erased,
            },
        );

        debug!(point, %id, priority, value_type = type_name::<T>(), "Hook registered");
        id
    }

    /// Run every callback on `point` over `value` and return the result.
    ///
    /// Never fails: a callback that errors or panics is skipped, and its input
    /// passes unchanged to the next callback.
    pub fn execute<T>(&self, point: &str, value: T) -> T
    where
        T: Clone + Send + 'static,
    {
        let hooks = match self.points.read().get(point) {
            Some(hooks) if !hooks.is_empty() => hooks.clone(),
            _ => return value,
        };

        let mut current = value;
        for hook in &hooks {
            let input: Payload = Box::new(current.clone());
            let callback = Arc::clone(&hook.callback);

            match catch_unwind(AssertUnwindSafe(move || callback(input))) {
                Ok(Ok(output)) => match output.downcast::<T>() {
                    Ok(next) => current = *next,
                    Err(_) => {
                        warn!(point, id = %hook.id, "Hook returned an unexpected type, skipping");
                    }
                },
                Ok(Err(Outcome::TypeMismatch { expected })) => {
                    debug!(
                        point,
                        id = %hook.id,
                        expected,
                        actual = type_name::<T>(),
                        "Hook registered for another value type, skipping"
                    );
                }
                Ok(Err(Outcome::Failed(e))) => {
                    warn!(point, id = %hook.id, error = %e, "Hook failed, passing value through");
                }
                Err(panic) => {
                    warn!(
                        point,
                        id = %hook.id,
                        panic = %panic_message(panic.as_ref()),
                        "Hook panicked, passing value through"
                    );
                }
            }
        }
        current
    }

    /// Remove one callback. Returns `true` if it was registered.
    pub fn unregister(&self, id: HookId) -> bool {
        let mut points = self.points.write();
        let mut found = false;
        for hooks in points.values_mut() {
            let before = hooks.len();
            hooks.retain(|h| h.id != id);
            found |= hooks.len() < before;
        }
        points.retain(|_, hooks| !hooks.is_empty());
        found
    }

    /// Remove every callback on `point`. Returns how many were removed.
    pub fn clear(&self, point: &str) -> usize {
        self.points.write().remove(point).map_or(0, |hooks| hooks.len())
    }

    /// Remove every callback on every point.
    pub fn clear_all(&self) {
        self.points.write().clear();
    }

    /// Whether `point` has at least one callback.
    #[must_use]
    pub fn has_hooks(&self, point: &str) -> bool {
        self.count(point) > 0
    }

    /// Number of callbacks on `point`.
    #[must_use]
    pub fn count(&self, point: &str) -> usize {
        self.points.read().get(point).map_or(0, Vec::len)
    }

    /// Names of every point with at least one callback, sorted.
    #[must_use]
    pub fn points(&self) -> Vec<String> {
        let mut names: Vec<String> = self.points.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points = self.points.read();
        let counts: HashMap<&str, usize> =
            points.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("HookRegistry").field("points", &counts).finish()
    }
}

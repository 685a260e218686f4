//! # Shared Hooks - Priority-Ordered Transformation Pipelines
//!
//! A hook point is a name bound to an ordered list of callbacks. Executing the
//! point folds every callback over a value:
//!
//! ```text
//! execute("title", v0)
//!     v1 = cb[prio 20](v0)
//!     v2 = cb[prio 10](v1)   ── fails → v2 = v1, logged, chain continues
//!     v3 = cb[prio  0](v2)
//!     return v3
//! ```
//!
//! ## Guarantees
//!
//! - Descending priority; equal priorities keep registration order.
//! - Callbacks for one point run strictly one after another.
//! - `execute` never fails and never panics because of a callback: errors and
//!   panics are contained and the last good value flows on.
//! - With no callbacks registered, the input is returned unchanged.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod registry;

pub use registry::{HookError, HookId, HookRegistry, HookResult};

/// Priority used when the caller has no ordering preference.
pub const DEFAULT_PRIORITY: i32 = 0;

//! # App Runtime - Composition Root and Plugin Lifecycle
//!
//! Wires the shared registries into one [`AppContext`] and drives modules
//! through a fixed startup sequence.
//!
//! ## Components
//!
//! ```text
//! ┌──────────────────────────── AppContext ─────────────────────────────┐
//! │                                                                     │
//! │  Services: ConfigResolver · HookRegistry · EventBus · ViewRegistry  │
//! │                                                                     │
//! │  CapabilityRegistry ◄── capability modules (adapters.<name>)        │
//! │          ▲                                                          │
//! │          │ get::<T>()                                               │
//! │  PluginSequencer ──► plugins (plugins.<name>)                       │
//! │                      register → init → start → lifecycle → stop     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                 ▲
//!                 │ run()
//!            Bootstrapper
//! ```
//!
//! ## Failure Policy
//!
//! - Capability lookups fail immediately with [`CapabilityError`].
//! - Module and plugin lifecycle failures are collected into the
//!   [`BootstrapReport`], never thrown.
//! - Hook and event handler failures stay inside their registries.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bootstrap;
pub mod capabilities;
pub mod container;
pub mod error;
pub mod plugins;
pub mod services;
pub mod views;

pub use bootstrap::{
    BootstrapFailure, BootstrapReport, Bootstrapper, ConfigSource, NavigationBridge,
    PersistenceBackend, PluginTimings, StaticConfigSource,
};
pub use capabilities::{
    CapabilityFactory, CapabilityKey, CapabilityModule, CapabilityRegistry, CapabilityState,
    ModuleContext,
};
pub use container::{AppContext, AppContextBuilder};
pub use error::{BootstrapError, BoxError, CapabilityError, ModuleError, PluginError, ViewError};
pub use plugins::{
    PhaseOutcome, Plugin, PluginContext, PluginPhase, PluginSequencer, PluginState, Registration,
    SequencerConfig,
};
pub use services::Services;
pub use views::{BuiltView, ViewProps, ViewRegistry};

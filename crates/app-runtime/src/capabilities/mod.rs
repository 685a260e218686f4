//! # Capabilities
//!
//! Backend-integration modules and the type-keyed registry they feed.
//!
//! A module validates its `adapters.<name>` configuration slice, then
//! registers factories for abstract capability types (usually trait
//! objects). Feature code asks for a capability by type; it is built on
//! first request and cached for the life of the composition root.

pub mod factory;
pub mod module;
pub mod registry;

pub use factory::{CapabilityFactory, CapabilityKey, DynFactory};
pub use module::{CapabilityModule, ModuleContext};
pub use registry::{CapabilityRegistry, CapabilityState};

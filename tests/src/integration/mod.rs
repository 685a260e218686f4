//! Cross-crate integration scenarios.

pub mod bootstrap;
pub mod extension;
pub mod lifecycle;
pub mod modules;

//! # Shared Config - Layered Configuration Resolution
//!
//! Holds the raw configuration tree loaded once at bootstrap and a separate
//! defaults layer that grows as modules register.
//!
//! ## Resolution Tiers
//!
//! ```text
//! get("plugins:auth:timeout", fallback)
//!        │
//!        ├──► raw tree      (set once by the bootstrapper)
//!        │        miss
//!        ├──► defaults layer (merged per module, never touches raw)
//!        │        miss
//!        └──► fallback
//! ```
//!
//! `has()` only consults the raw tree: a value that exists purely through the
//! defaults layer is reported absent.
//!
//! ## Schema Validation
//!
//! Capability modules declare a [`ConfigSchema`]. Validation itself is a
//! black box behind [`SchemaValidator`]; [`BasicSchemaValidator`] is the
//! reference implementation checking presence and JSON types.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod resolver;
pub mod schema;
pub mod validator;

pub use error::ConfigError;
pub use resolver::ConfigResolver;
pub use schema::{ConfigSchema, FieldSpec, FieldType};
pub use validator::{BasicSchemaValidator, SchemaValidator, ValidationReport, Violation};

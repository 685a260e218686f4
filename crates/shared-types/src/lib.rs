//! # Shared Types Crate
//!
//! Vocabulary shared by every crate in the Keel workspace.
//!
//! ## Design Principles
//!
//! - **No state**: these are plain values. Every registry that owns state lives
//!   in its own crate and is owned by exactly one composition root.
//! - **Generic configuration**: configuration is an already-parsed
//!   `serde_json` tree, addressed by `.`- or `:`-separated paths.
//! - **Stable component identity**: failures and timings are keyed by
//!   [`ComponentKey`], rendered as `adapter:<name>` or `plugin:<name>`.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod entities;
pub mod errors;
pub mod panic;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use panic::panic_message;

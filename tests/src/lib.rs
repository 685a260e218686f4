//! # Keel Test Suite
//!
//! Unified test crate for scenarios that span several crates.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks for the hot paths
//! └── src/integration/  # Cross-crate scenarios
//!     ├── bootstrap.rs  # Full orchestration runs
//!     ├── lifecycle.rs  # Plugin phase ordering and isolation
//!     ├── modules.rs    # Capability modules and validation
//!     └── extension.rs  # Hooks, events and views across plugins
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p keel-tests
//! cargo test -p keel-tests integration::lifecycle
//! cargo bench -p keel-tests
//! ```

#![allow(unused_variables)]
#![allow(dead_code)]

pub mod integration;

//! Persistence drivers for Strata.
//!
//! A driver stores JSON values at [`PathAddress`](strata_types::PathAddress)
//! locations. The configuration layer above never talks to storage any other
//! way, so backends are interchangeable.
//!
//! # Backends
//!
//! All backends implement the [`Driver`] trait:
//!
//! - [`InMemoryDriver`] -- one process-local JSON tree, for tests and embedding
//! - [`JsonDriver`] -- one `settings.json` file per owner
//!
//! Owners obtain their driver through a [`DriverFactory`]; a
//! [`BackendConfig`] read from TOML picks the factory.
//!
//! # Design Rules
//!
//! 1. Storage is a tree keyed by address segments; partial addresses read
//!    whole subtrees.
//! 2. `get` reports absence as [`DriverError::NotFound`], never as `null`.
//! 3. `clear` of a missing value is not an error.
//! 4. Single calls are atomic; no cross-call transactions.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod factory;
pub mod json;
pub mod memory;
pub mod traits;
pub mod tree;

// Re-export primary types at crate root for ergonomic imports.
pub use config::BackendConfig;
pub use error::{DriverError, DriverResult};
pub use factory::{JsonDriverFactory, SharedDriverFactory};
pub use json::{JsonDriver, LEGACY_IDENTIFIER_MODULUS, SETTINGS_FILE};
pub use memory::InMemoryDriver;
pub use traits::{Driver, DriverFactory};

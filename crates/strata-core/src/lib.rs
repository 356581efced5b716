//! Layered configuration store.
//!
//! Owners register default schemas per [`Category`](strata_types::Category),
//! read effective values (stored data merged with those defaults) and update
//! nested configuration through locked read-modify-write sections. Storage
//! is delegated to a [`Driver`](strata_driver::Driver).
//!
//! # Architecture
//!
//! - **[`ConfigContext`]** owns the process-wide registries: one live
//!   [`Config`] per owner, and the [`LockRegistry`] of path locks.
//! - **[`Config`]** holds an owner's defaults and driver and builds root
//!   groups for a category and its primary keys.
//! - **[`Group`]** resolves keys into child groups or values by inspecting
//!   the defaults, and merges stored mappings with defaults on read.
//! - **[`Value`]** reads, writes and clears a single node.
//! - **[`ValueGuard`]** is the working copy of a read-modify-write section;
//!   it writes back only what changed.
//!
//! # Concurrency
//!
//! Read-modify-write sections on the same exact address run one at a time.
//! Sections on different addresses never wait on each other. Plain `get` and
//! `set` take no lock at all.
//!
//! # Modules
//!
//! - [`error`]: Error types for configuration operations
//! - [`merge`]: The default-merging algorithm
//! - [`schema`]: Registered defaults and custom category arities
//! - [`lock`]: Per-address locks
//! - [`value`] / [`group`]: Accessors
//! - [`config`]: The per-owner store
//! - [`context`]: Instance cache and shared registries

pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod lock;
pub mod merge;
pub mod schema;
pub mod value;

pub use config::{Config, CORE_IDENTIFIER, CORE_OWNER};
pub use context::ConfigContext;
pub use error::{ConfigError, ConfigResult};
pub use group::{Child, ChildKind, Group};
pub use lock::{LockRegistry, PathLock, PathLockGuard};
pub use schema::Schema;
pub use value::{Value, ValueGuard};

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use strata_types::PathAddress;

use crate::error::DriverResult;

/// Persistence backend for configuration values.
///
/// All implementations must satisfy these invariants:
/// - Values are addressed by [`PathAddress::segments`]. Storage is a tree:
///   reading a partial address returns the whole subtree below it.
/// - `get` fails with [`DriverError::NotFound`](crate::DriverError::NotFound)
///   only when nothing was ever stored at (or below) the address.
/// - `set` overwrites unconditionally; `clear` on a missing value is a no-op.
/// - Each single call is atomic. Sequences of calls are not; callers needing
///   read-modify-write exclusivity coordinate above the driver.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Read the value stored at `address`.
    async fn get(&self, address: &PathAddress) -> DriverResult<JsonValue>;

    /// Store `value` at `address`, replacing whatever was there.
    async fn set(&self, address: &PathAddress, value: JsonValue) -> DriverResult<()>;

    /// Remove the value stored at `address`, if any.
    async fn clear(&self, address: &PathAddress) -> DriverResult<()>;

    /// Relabel data stored under a legacy form of the owner's numeric
    /// identifier. Backends without legacy layouts keep the default no-op.
    async fn migrate_identifier(&self, _old_identifier: u64) -> DriverResult<()> {
        Ok(())
    }

    /// Short backend name for logs and diagnostics.
    fn backend_name(&self) -> &'static str;
}

/// Resolves the driver an owner's store should use.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn driver_for(
        &self,
        owner_namespace: &str,
        owner_instance_id: &str,
    ) -> DriverResult<Arc<dyn Driver>>;
}

use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use strata_types::PathAddress;
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::traits::Driver;
use crate::tree;

/// In-memory driver holding every owner's data in one JSON tree.
///
/// Intended for tests and embedding. The tree sits behind a `RwLock`;
/// values are cloned on read and write. Data is lost when the driver is
/// dropped.
pub struct InMemoryDriver {
    data: RwLock<JsonValue>,
}

impl InMemoryDriver {
    /// Create a new empty driver.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(JsonValue::Object(Map::new())),
        }
    }

    /// Create a driver preloaded with `data`, laid out by address segments.
    pub fn with_data(data: JsonValue) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Deep copy of the whole tree.
    pub fn snapshot(&self) -> JsonValue {
        self.data.read().expect("lock poisoned").clone()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data
            .read()
            .expect("lock poisoned")
            .as_object()
            .map_or(true, Map::is_empty)
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    async fn get(&self, address: &PathAddress) -> DriverResult<JsonValue> {
        let data = self.data.read().expect("lock poisoned");
        tree::get_at(&data, &address.segments())
            .cloned()
            .ok_or_else(|| DriverError::NotFound(address.clone()))
    }

    async fn set(&self, address: &PathAddress, value: JsonValue) -> DriverResult<()> {
        let mut data = self.data.write().expect("lock poisoned");
        tree::set_at(&mut data, &address.segments(), value);
        debug!(%address, "value stored");
        Ok(())
    }

    async fn clear(&self, address: &PathAddress) -> DriverResult<()> {
        let mut data = self.data.write().expect("lock poisoned");
        let removed = tree::clear_at(&mut data, &address.segments());
        debug!(%address, removed, "value cleared");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owners = self
            .data
            .read()
            .expect("lock poisoned")
            .as_object()
            .map_or(0, Map::len);
        f.debug_struct("InMemoryDriver")
            .field("owner_count", &owners)
            .finish()
    }
}

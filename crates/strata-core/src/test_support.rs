//! Helpers shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use strata_driver::{Driver, DriverResult, InMemoryDriver, SharedDriverFactory};
use strata_types::PathAddress;

use crate::config::Config;
use crate::context::ConfigContext;

/// In-memory driver that counts calls and can slow down reads, so tests
/// can observe writes and force interleaving between tasks.
#[derive(Default)]
pub(crate) struct CountingDriver {
    inner: InMemoryDriver,
    writes: AtomicUsize,
    read_delay: Option<Duration>,
}

impl CountingDriver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_read_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            read_delay: Some(delay),
            ..Self::default()
        })
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for CountingDriver {
    async fn get(&self, address: &PathAddress) -> DriverResult<JsonValue> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(address).await
    }

    async fn set(&self, address: &PathAddress, value: JsonValue) -> DriverResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(address, value).await
    }

    async fn clear(&self, address: &PathAddress) -> DriverResult<()> {
        self.inner.clear(address).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

pub(crate) fn context(driver: Arc<dyn Driver>) -> ConfigContext {
    ConfigContext::new(Arc::new(SharedDriverFactory::new(driver)))
}

/// A fresh store for owner `Mod`, instance `1`, with its context.
pub(crate) async fn store(driver: Arc<dyn Driver>, force_registration: bool) -> (ConfigContext, Arc<Config>) {
    let ctx = context(driver);
    let config = ctx
        .get_instance("Mod", "1", force_registration)
        .await
        .unwrap();
    (ctx, config)
}

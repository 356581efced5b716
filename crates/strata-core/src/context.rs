//! Process-wide registries: live stores per owner and path locks.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use strata_driver::DriverFactory;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Config, CORE_IDENTIFIER, CORE_OWNER};
use crate::error::ConfigResult;
use crate::lock::LockRegistry;

type InstanceKey = (String, String);

/// Shared state of the configuration subsystem.
///
/// Create one at startup and pass it to whoever needs a store. It owns the
/// instance table (at most one live [`Config`] per owner namespace and
/// instance id), the [`LockRegistry`] shared by every store, and the
/// [`DriverFactory`] that binds new stores to storage. Both tables hold
/// their entries weakly; a store nobody references any more is dropped and
/// a later request builds a fresh one.
pub struct ConfigContext {
    drivers: Arc<dyn DriverFactory>,
    locks: Arc<LockRegistry>,
    instances: Mutex<HashMap<InstanceKey, Weak<Config>>>,
    retrieved: Mutex<Vec<Weak<Config>>>,
}

impl ConfigContext {
    pub fn new(drivers: Arc<dyn DriverFactory>) -> Self {
        Self {
            drivers,
            locks: LockRegistry::new(),
            instances: Mutex::new(HashMap::new()),
            retrieved: Mutex::new(Vec::new()),
        }
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// Store of `owner_namespace` for a numeric identifier.
    ///
    /// When the store is first built, its driver gets a chance to migrate
    /// data stored under a legacy form of the identifier.
    pub async fn get_conf(
        &self,
        owner_namespace: &str,
        identifier: u64,
        force_registration: bool,
    ) -> ConfigResult<Arc<Config>> {
        let instance_id = identifier.to_string();
        self.instance(owner_namespace, &instance_id, force_registration, Some(identifier))
            .await
    }

    /// Store for the application's own settings.
    pub async fn get_core_conf(&self, force_registration: bool) -> ConfigResult<Arc<Config>> {
        self.get_conf(CORE_OWNER, CORE_IDENTIFIER, force_registration)
            .await
    }

    /// The live store for `(owner_namespace, owner_instance_id)`, built on
    /// first request.
    ///
    /// When a store already exists it is returned as is; `force_registration`
    /// only applies to newly built stores.
    pub async fn get_instance(
        &self,
        owner_namespace: &str,
        owner_instance_id: &str,
        force_registration: bool,
    ) -> ConfigResult<Arc<Config>> {
        self.instance(owner_namespace, owner_instance_id, force_registration, None)
            .await
    }

    async fn instance(
        &self,
        owner_namespace: &str,
        owner_instance_id: &str,
        force_registration: bool,
        legacy_identifier: Option<u64>,
    ) -> ConfigResult<Arc<Config>> {
        let mut instances = self.instances.lock().await;
        instances.retain(|_, weak| weak.strong_count() > 0);

        let key = (owner_namespace.to_string(), owner_instance_id.to_string());
        if let Some(existing) = instances.get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let driver = self
            .drivers
            .driver_for(owner_namespace, owner_instance_id)
            .await?;
        if let Some(identifier) = legacy_identifier {
            driver.migrate_identifier(identifier).await?;
        }
        let backend = driver.backend_name();
        let config = Arc::new(Config::new(
            owner_namespace,
            owner_instance_id,
            driver,
            Arc::clone(&self.locks),
            force_registration,
        ));
        instances.insert(key, Arc::downgrade(&config));
        debug!(
            owner = owner_namespace,
            instance = owner_instance_id,
            backend,
            "config instance created"
        );
        Ok(config)
    }

    /// Live stores created since the previous call.
    ///
    /// Lets operational tooling discover every owner that registered during
    /// this process without threading state through each call site.
    pub async fn latest_confs(&self) -> Vec<Arc<Config>> {
        let live: Vec<Arc<Config>> = self
            .instances
            .lock()
            .await
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        let mut retrieved = self.retrieved.lock().await;
        retrieved.retain(|weak| weak.strong_count() > 0);

        let fresh: Vec<Arc<Config>> = live
            .into_iter()
            .filter(|config| {
                !retrieved
                    .iter()
                    .any(|seen| std::ptr::eq(seen.as_ptr(), Arc::as_ptr(config)))
            })
            .collect();
        retrieved.extend(fresh.iter().map(Arc::downgrade));
        fresh
    }

    /// Number of live stores.
    pub async fn instance_count(&self) -> usize {
        self.instances
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigContext")
            .field("locks", &self.locks.len())
            .finish()
    }
}

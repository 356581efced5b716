use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::DriverResult;
use crate::json::{JsonDriver, OwnerFile};
use crate::traits::{Driver, DriverFactory};

/// Hands every owner the same driver.
pub struct SharedDriverFactory {
    driver: Arc<dyn Driver>,
}

impl SharedDriverFactory {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl DriverFactory for SharedDriverFactory {
    async fn driver_for(&self, _owner: &str, _instance: &str) -> DriverResult<Arc<dyn Driver>> {
        Ok(Arc::clone(&self.driver))
    }
}

/// Opens one [`JsonDriver`] per owner below a data directory.
///
/// Each owner's file is loaded once; drivers for further instance ids of the
/// same owner share it.
pub struct JsonDriverFactory {
    data_path: PathBuf,
    files: Mutex<HashMap<String, Arc<OwnerFile>>>,
}

impl JsonDriverFactory {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

#[async_trait]
impl DriverFactory for JsonDriverFactory {
    async fn driver_for(
        &self,
        owner_namespace: &str,
        owner_instance_id: &str,
    ) -> DriverResult<Arc<dyn Driver>> {
        let mut files = self.files.lock().await;
        let file = match files.get(owner_namespace) {
            Some(file) => Arc::clone(file),
            None => {
                let file = Arc::new(OwnerFile::open(&self.data_path, owner_namespace).await?);
                files.insert(owner_namespace.to_string(), Arc::clone(&file));
                debug!(owner = owner_namespace, "opened owner settings file");
                file
            }
        };
        Ok(Arc::new(JsonDriver::from_shared(
            file,
            owner_namespace,
            owner_instance_id,
        )))
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use strata_types::PathAddress;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DriverError, DriverResult};
use crate::traits::Driver;
use crate::tree;

/// File name of an owner's data inside its directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Modulus of the reduced identifier form used by older data layouts.
pub const LEGACY_IDENTIFIER_MODULUS: u64 = (1 << 61) - 1;

/// One owner's `settings.json`, loaded in memory and rewritten on change.
///
/// The tree is keyed by instance id, then category, primary keys and nested
/// path. The mutex is held across the file write so writes land on disk in
/// the order they were applied.
pub(crate) struct OwnerFile {
    path: PathBuf,
    data: Mutex<JsonValue>,
}

impl OwnerFile {
    pub(crate) async fn open(data_path: &Path, owner_namespace: &str) -> DriverResult<Self> {
        let dir = data_path.join(owner_namespace);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(SETTINGS_FILE);

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<JsonValue>(&bytes) {
                Ok(value) if value.is_object() => value,
                Ok(_) | Err(_) => {
                    let backup = path.with_extension("json.bak");
                    warn!(path = %path.display(), backup = %backup.display(), "unreadable settings file; moving it aside");
                    tokio::fs::rename(&path, &backup).await?;
                    JsonValue::Object(Map::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => JsonValue::Object(Map::new()),
            Err(e) => return Err(e.into()),
        };
        info!(owner = owner_namespace, path = %path.display(), "settings file loaded");

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Apply `edit` to a copy of the tree and persist it. The loaded tree is
    /// replaced only once the file write succeeded; if `edit` returns
    /// `false` nothing is written.
    async fn update<F>(&self, edit: F) -> DriverResult<bool>
    where
        F: FnOnce(&mut JsonValue) -> bool + Send,
    {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        if !edit(&mut next) {
            return Ok(false);
        }
        self.persist(&next).await?;
        *data = next;
        Ok(true)
    }

    async fn persist(&self, data: &JsonValue) -> DriverResult<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Driver storing one JSON file per owner under a data directory.
///
/// Layout: `<data_path>/<owner_namespace>/settings.json`. Several handles for
/// the same owner (different instance ids) can share one loaded file; see
/// [`JsonDriverFactory`](crate::JsonDriverFactory).
pub struct JsonDriver {
    file: Arc<OwnerFile>,
    owner_namespace: String,
    owner_instance_id: String,
}

impl JsonDriver {
    /// Open (or create) the settings file of `owner_namespace`.
    pub async fn open(
        data_path: impl AsRef<Path>,
        owner_namespace: &str,
        owner_instance_id: &str,
    ) -> DriverResult<Self> {
        let file = OwnerFile::open(data_path.as_ref(), owner_namespace).await?;
        Ok(Self::from_shared(Arc::new(file), owner_namespace, owner_instance_id))
    }

    pub(crate) fn from_shared(
        file: Arc<OwnerFile>,
        owner_namespace: &str,
        owner_instance_id: &str,
    ) -> Self {
        Self {
            file,
            owner_namespace: owner_namespace.to_string(),
            owner_instance_id: owner_instance_id.to_string(),
        }
    }

    /// Path of the backing settings file.
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    // The owner is implied by the file, so its segment is skipped.
    fn file_segments(address: &PathAddress) -> Vec<&str> {
        address.segments().split_off(1)
    }
}

#[async_trait]
impl Driver for JsonDriver {
    async fn get(&self, address: &PathAddress) -> DriverResult<JsonValue> {
        let data = self.file.data.lock().await;
        tree::get_at(&data, &Self::file_segments(address))
            .cloned()
            .ok_or_else(|| DriverError::NotFound(address.clone()))
    }

    async fn set(&self, address: &PathAddress, value: JsonValue) -> DriverResult<()> {
        let segments = Self::file_segments(address);
        self.file
            .update(|data| {
                tree::set_at(data, &segments, value);
                true
            })
            .await?;
        debug!(%address, "value written");
        Ok(())
    }

    async fn clear(&self, address: &PathAddress) -> DriverResult<()> {
        let segments = Self::file_segments(address);
        if self
            .file
            .update(|data| tree::clear_at(data, &segments))
            .await?
        {
            debug!(%address, "value cleared");
        }
        Ok(())
    }

    async fn migrate_identifier(&self, old_identifier: u64) -> DriverResult<()> {
        let current = self.owner_instance_id.as_str();
        let candidates = [
            (old_identifier % LEGACY_IDENTIFIER_MODULUS).to_string(),
            old_identifier.to_string(),
        ];
        let mut moved_from = None;
        self.file
            .update(|data| {
                let Some(map) = data.as_object_mut() else {
                    return false;
                };
                if map.contains_key(current) {
                    return false;
                }
                let Some(legacy) = candidates
                    .into_iter()
                    .find(|c| c != current && map.contains_key(c))
                else {
                    return false;
                };
                if let Some(moved) = map.remove(&legacy) {
                    map.insert(current.to_string(), moved);
                }
                moved_from = Some(legacy);
                true
            })
            .await?;
        let Some(legacy) = moved_from else {
            return Ok(());
        };
        info!(
            owner = %self.owner_namespace,
            from = %legacy,
            to = %self.owner_instance_id,
            "migrated legacy identifier"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}

impl std::fmt::Debug for JsonDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDriver")
            .field("owner_namespace", &self.owner_namespace)
            .field("owner_instance_id", &self.owner_instance_id)
            .field("path", &self.file.path)
            .finish()
    }
}

//! The per-owner configuration store.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use strata_driver::Driver;
use strata_types::{normalize, Category, PathAddress};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::group::Group;
use crate::lock::LockRegistry;
use crate::merge::merge_defaults;
use crate::schema::Schema;

/// Owner name reserved for the application's own settings.
pub const CORE_OWNER: &str = "Core";

/// Identifier of the core owner's instance.
pub const CORE_IDENTIFIER: u64 = 0;

/// Configuration store of one owner.
///
/// Holds the owner's registered defaults and its driver, and manufactures
/// root [`Group`]s. Obtain instances through
/// [`ConfigContext`](crate::ConfigContext), which guarantees a single live
/// store per owner.
pub struct Config {
    owner_namespace: String,
    owner_instance_id: String,
    driver: Arc<dyn Driver>,
    force_registration: bool,
    schema: RwLock<Schema>,
    locks: Arc<LockRegistry>,
}

impl Config {
    pub(crate) fn new(
        owner_namespace: impl Into<String>,
        owner_instance_id: impl Into<String>,
        driver: Arc<dyn Driver>,
        locks: Arc<LockRegistry>,
        force_registration: bool,
    ) -> Self {
        Self {
            owner_namespace: owner_namespace.into(),
            owner_instance_id: owner_instance_id.into(),
            driver,
            force_registration,
            schema: RwLock::new(Schema::new()),
            locks,
        }
    }

    pub fn owner_namespace(&self) -> &str {
        &self.owner_namespace
    }

    pub fn owner_instance_id(&self) -> &str {
        &self.owner_instance_id
    }

    pub fn force_registration(&self) -> bool {
        self.force_registration
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Deep copy of the defaults registered for `category`.
    pub fn defaults(&self, category: &Category) -> Map<String, JsonValue> {
        self.schema
            .read()
            .expect("schema lock poisoned")
            .defaults_for(category)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Declare a custom category taking `arity` primary keys.
    pub fn init_custom(&self, name: &str, arity: usize) -> ConfigResult<Category> {
        self.schema
            .write()
            .expect("schema lock poisoned")
            .init_custom(name, arity)
    }

    /// Merge `defaults` (which must serialize to a mapping) into the
    /// defaults registered for `category`.
    pub fn register_defaults<T: Serialize + ?Sized>(
        &self,
        category: &Category,
        defaults: &T,
    ) -> ConfigResult<()> {
        let defaults = normalize(defaults)?;
        self.schema
            .write()
            .expect("schema lock poisoned")
            .register(category, defaults)?;
        debug!(owner = %self.owner_namespace, %category, "defaults registered");
        Ok(())
    }

    pub fn register_global<T: Serialize + ?Sized>(&self, defaults: &T) -> ConfigResult<()> {
        self.register_defaults(&Category::Global, defaults)
    }

    pub fn register_guild<T: Serialize + ?Sized>(&self, defaults: &T) -> ConfigResult<()> {
        self.register_defaults(&Category::Guild, defaults)
    }

    pub fn register_channel<T: Serialize + ?Sized>(&self, defaults: &T) -> ConfigResult<()> {
        self.register_defaults(&Category::Channel, defaults)
    }

    pub fn register_role<T: Serialize + ?Sized>(&self, defaults: &T) -> ConfigResult<()> {
        self.register_defaults(&Category::Role, defaults)
    }

    pub fn register_user<T: Serialize + ?Sized>(&self, defaults: &T) -> ConfigResult<()> {
        self.register_defaults(&Category::User, defaults)
    }

    pub fn register_member<T: Serialize + ?Sized>(&self, defaults: &T) -> ConfigResult<()> {
        self.register_defaults(&Category::Member, defaults)
    }

    /// Register defaults for a custom category declared with
    /// [`init_custom`](Self::init_custom).
    pub fn register_custom<T: Serialize + ?Sized>(
        &self,
        name: &str,
        defaults: &T,
    ) -> ConfigResult<()> {
        self.register_defaults(&Category::custom(name)?, defaults)
    }

    // -----------------------------------------------------------------------
    // Root groups
    // -----------------------------------------------------------------------

    /// Group for `category` and `primary_keys`.
    ///
    /// With every primary key supplied the group carries the category's
    /// defaults. With fewer it addresses a collection of records and has no
    /// defaults.
    pub fn root_group(&self, category: &Category, primary_keys: Vec<String>) -> ConfigResult<Group> {
        let schema = self.schema.read().expect("schema lock poisoned");
        let arity = schema.arity(category)?;
        let address = PathAddress::new(
            self.owner_namespace.clone(),
            self.owner_instance_id.clone(),
            category.clone(),
            primary_keys,
            arity,
        )?;
        let defaults = if address.is_complete() {
            schema.defaults_for(category)
        } else {
            Map::new()
        };
        Ok(Group::new(
            address,
            defaults,
            Arc::clone(&self.driver),
            Arc::clone(&self.locks),
            self.force_registration,
        ))
    }

    pub fn global_group(&self) -> ConfigResult<Group> {
        self.root_group(&Category::Global, Vec::new())
    }

    pub fn guild(&self, guild_id: u64) -> ConfigResult<Group> {
        self.root_group(&Category::Guild, vec![guild_id.to_string()])
    }

    pub fn channel(&self, channel_id: u64) -> ConfigResult<Group> {
        self.root_group(&Category::Channel, vec![channel_id.to_string()])
    }

    pub fn role(&self, role_id: u64) -> ConfigResult<Group> {
        self.root_group(&Category::Role, vec![role_id.to_string()])
    }

    pub fn user(&self, user_id: u64) -> ConfigResult<Group> {
        self.root_group(&Category::User, vec![user_id.to_string()])
    }

    pub fn member(&self, guild_id: u64, user_id: u64) -> ConfigResult<Group> {
        self.root_group(
            &Category::Member,
            vec![guild_id.to_string(), user_id.to_string()],
        )
    }

    pub fn custom(&self, name: &str, primary_keys: &[&str]) -> ConfigResult<Group> {
        self.root_group(
            &Category::custom(name)?,
            primary_keys.iter().map(|k| k.to_string()).collect(),
        )
    }

    // -----------------------------------------------------------------------
    // Bulk enumeration
    // -----------------------------------------------------------------------

    /// Every stored record of `category` below `prefix`, keyed by the
    /// remaining primary keys.
    ///
    /// With more than one key left the result is nested one mapping level
    /// per key. Records that are mappings are merged with the category
    /// defaults; anything else is returned as stored.
    pub async fn all_for_category(
        &self,
        category: &Category,
        prefix: Vec<String>,
    ) -> ConfigResult<Map<String, JsonValue>> {
        let group = self.root_group(category, prefix)?;
        let address = group.address();
        let remaining = address.primary_key_arity() - address.primary_keys().len();
        if remaining == 0 {
            return Err(ConfigError::NothingToEnumerate {
                category: category.to_string(),
            });
        }
        let records = match self.driver.get(address).await {
            Ok(JsonValue::Object(records)) => records,
            Ok(other) => {
                warn!(%address, kind = crate::error::json_kind(&other), "category data is not a mapping; skipping");
                return Ok(Map::new());
            }
            Err(e) if e.is_not_found() => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(fill_records(records, remaining, &self.defaults(category)))
    }

    /// Effective global settings.
    pub async fn all_global(&self) -> ConfigResult<Map<String, JsonValue>> {
        self.global_group()?.all().await
    }

    pub async fn all_guilds(&self) -> ConfigResult<Map<String, JsonValue>> {
        self.all_for_category(&Category::Guild, Vec::new()).await
    }

    pub async fn all_channels(&self) -> ConfigResult<Map<String, JsonValue>> {
        self.all_for_category(&Category::Channel, Vec::new()).await
    }

    pub async fn all_roles(&self) -> ConfigResult<Map<String, JsonValue>> {
        self.all_for_category(&Category::Role, Vec::new()).await
    }

    pub async fn all_users(&self) -> ConfigResult<Map<String, JsonValue>> {
        self.all_for_category(&Category::User, Vec::new()).await
    }

    /// Members of one guild keyed by user id, or of every guild keyed by
    /// guild id then user id.
    pub async fn all_members(&self, guild_id: Option<u64>) -> ConfigResult<Map<String, JsonValue>> {
        let prefix = guild_id.map(|id| vec![id.to_string()]).unwrap_or_default();
        self.all_for_category(&Category::Member, prefix).await
    }

    pub async fn all_custom(
        &self,
        name: &str,
        prefix: &[&str],
    ) -> ConfigResult<Map<String, JsonValue>> {
        let prefix = prefix.iter().map(|k| k.to_string()).collect();
        self.all_for_category(&Category::custom(name)?, prefix).await
    }

    // -----------------------------------------------------------------------
    // Bulk clearing
    // -----------------------------------------------------------------------

    /// Remove every stored record of `category` below `prefix`.
    pub async fn clear_all_for_category(
        &self,
        category: &Category,
        prefix: Vec<String>,
    ) -> ConfigResult<()> {
        self.root_group(category, prefix)?.clear().await?;
        debug!(owner = %self.owner_namespace, %category, "category cleared");
        Ok(())
    }

    pub async fn clear_all_globals(&self) -> ConfigResult<()> {
        self.clear_all_for_category(&Category::Global, Vec::new()).await
    }

    pub async fn clear_all_guilds(&self) -> ConfigResult<()> {
        self.clear_all_for_category(&Category::Guild, Vec::new()).await
    }

    pub async fn clear_all_channels(&self) -> ConfigResult<()> {
        self.clear_all_for_category(&Category::Channel, Vec::new()).await
    }

    pub async fn clear_all_roles(&self) -> ConfigResult<()> {
        self.clear_all_for_category(&Category::Role, Vec::new()).await
    }

    pub async fn clear_all_users(&self) -> ConfigResult<()> {
        self.clear_all_for_category(&Category::User, Vec::new()).await
    }

    pub async fn clear_all_members(&self, guild_id: Option<u64>) -> ConfigResult<()> {
        let prefix = guild_id.map(|id| vec![id.to_string()]).unwrap_or_default();
        self.clear_all_for_category(&Category::Member, prefix).await
    }

    pub async fn clear_all_custom(&self, name: &str) -> ConfigResult<()> {
        self.clear_all_for_category(&Category::custom(name)?, Vec::new())
            .await
    }

    /// Remove everything this owner stored, in every built-in and declared
    /// custom category.
    pub async fn clear_all(&self) -> ConfigResult<()> {
        let customs = self
            .schema
            .read()
            .expect("schema lock poisoned")
            .custom_categories();
        for category in Category::BUILTIN.into_iter().chain(customs) {
            self.clear_all_for_category(&category, Vec::new()).await?;
        }
        Ok(())
    }
}

fn fill_records(
    records: Map<String, JsonValue>,
    depth: usize,
    defaults: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    records
        .into_iter()
        .map(|(key, record)| {
            let record = match record {
                JsonValue::Object(nested) if depth > 1 => {
                    JsonValue::Object(fill_records(nested, depth - 1, defaults))
                }
                other if depth > 1 => other,
                other => merge_defaults(other, defaults),
            };
            (key, record)
        })
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("owner_namespace", &self.owner_namespace)
            .field("owner_instance_id", &self.owner_instance_id)
            .field("backend", &self.driver.backend_name())
            .field("force_registration", &self.force_registration)
            .finish()
    }
}

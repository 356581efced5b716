//! Composite accessor resolving keys into child groups and values.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use strata_driver::Driver;
use strata_types::{normalize, PathAddress};

use crate::error::{json_kind, ConfigError, ConfigResult};
use crate::lock::{LockRegistry, PathLock};
use crate::merge::{default_at, merge_defaults};
use crate::value::{modify_target, try_modify_target, Target, Value, ValueGuard};

/// What a key below a group refers to, according to the registered schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    /// The default is a mapping.
    Group,
    /// The default is any other value.
    Value,
    /// The key has no registered default.
    Unregistered,
}

/// A resolved child accessor.
#[derive(Clone, Debug)]
pub enum Child {
    Group(Group),
    Value(Value),
}

impl Child {
    pub fn address(&self) -> &PathAddress {
        match self {
            Child::Group(group) => group.address(),
            Child::Value(value) => value.address(),
        }
    }

    pub fn into_group(self) -> Option<Group> {
        match self {
            Child::Group(group) => Some(group),
            Child::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Child::Value(value) => Some(value),
            Child::Group(_) => None,
        }
    }
}

/// A mapping of configuration data, made of nested groups and values.
///
/// Reads merge the stored mapping with the group's defaults. Keys are
/// resolved against the defaults: mappings become child groups, everything
/// else a child value. Keys missing from the defaults are an error under
/// forced registration and otherwise yield a value with no default, which
/// lets dynamic data be stored without a schema.
#[derive(Clone)]
pub struct Group {
    value: Value,
    defaults: Map<String, JsonValue>,
    force_registration: bool,
}

impl Group {
    pub(crate) fn new(
        address: PathAddress,
        defaults: Map<String, JsonValue>,
        driver: Arc<dyn Driver>,
        locks: Arc<LockRegistry>,
        force_registration: bool,
    ) -> Self {
        Self {
            value: Value::new(address, JsonValue::Object(Map::new()), driver, locks),
            defaults,
            force_registration,
        }
    }

    pub fn address(&self) -> &PathAddress {
        &self.value.address
    }

    /// This group viewed as a plain value, without default merging.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn force_registration(&self) -> bool {
        self.force_registration
    }

    /// Deep copy of this group's defaults.
    pub fn defaults(&self) -> Map<String, JsonValue> {
        self.defaults.clone()
    }

    /// Classify `key` by inspecting the defaults.
    pub fn resolve(&self, key: &str) -> ChildKind {
        match self.defaults.get(key) {
            Some(JsonValue::Object(_)) => ChildKind::Group,
            Some(_) => ChildKind::Value,
            None => ChildKind::Unregistered,
        }
    }

    pub fn is_group(&self, key: &str) -> bool {
        self.resolve(key) == ChildKind::Group
    }

    pub fn is_value(&self, key: &str) -> bool {
        self.resolve(key) == ChildKind::Value
    }

    /// Accessor for `key` directly below this group.
    pub fn child(&self, key: &str) -> ConfigResult<Child> {
        let address = self.address().child(key);
        match (self.resolve(key), self.defaults.get(key)) {
            (ChildKind::Group, Some(JsonValue::Object(defaults))) => {
                Ok(Child::Group(self.child_group(address, defaults.clone())))
            }
            (ChildKind::Value, Some(default)) => {
                Ok(Child::Value(self.child_value(address, default.clone())))
            }
            _ if self.force_registration => Err(ConfigError::NotRegistered {
                key: key.to_string(),
            }),
            _ => Ok(Child::Value(self.child_value(address, JsonValue::Null))),
        }
    }

    /// Child group at `key`.
    ///
    /// An unregistered key yields a group with no defaults unless
    /// registration is forced.
    pub fn group(&self, key: &str) -> ConfigResult<Group> {
        match self.child(key)? {
            Child::Group(group) => Ok(group),
            Child::Value(_) if self.resolve(key) == ChildKind::Unregistered => {
                Ok(self.child_group(self.address().child(key), Map::new()))
            }
            Child::Value(_) => Err(ConfigError::NotAGroup {
                key: key.to_string(),
            }),
        }
    }

    /// Child at `key` as a plain value. For a group key, the value's default
    /// is the group's defaults mapping and reads are not merged.
    pub fn value(&self, key: &str) -> ConfigResult<Value> {
        match self.child(key)? {
            Child::Value(value) => Ok(value),
            Child::Group(group) => Ok(group.value.with_default(JsonValue::Object(group.defaults))),
        }
    }

    /// Effective mapping: stored data merged with the defaults.
    pub async fn get(&self) -> ConfigResult<JsonValue> {
        self.read_with(&self.defaults).await
    }

    /// Effective mapping, failing if the stored data is not a mapping.
    pub async fn all(&self) -> ConfigResult<Map<String, JsonValue>> {
        match self.get().await? {
            JsonValue::Object(map) => Ok(map),
            other => Err(ConfigError::GroupRequiresMapping {
                found: json_kind(&other),
            }),
        }
    }

    /// Like [`get`](Self::get), merging against `defaults` instead of the
    /// registered defaults for this call only.
    pub async fn get_or(&self, defaults: Map<String, JsonValue>) -> ConfigResult<JsonValue> {
        self.read_with(&defaults).await
    }

    /// Effective mapping deserialized into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        Ok(serde_json::from_value(self.get().await?)?)
    }

    /// Replace the stored mapping. Anything but a mapping is rejected.
    pub async fn set<T: Serialize + ?Sized>(&self, value: &T) -> ConfigResult<()> {
        let value = normalize(value)?;
        if !value.is_object() {
            return Err(ConfigError::GroupRequiresMapping {
                found: json_kind(&value),
            });
        }
        self.value.driver.set(self.address(), value).await?;
        Ok(())
    }

    /// Remove all stored data of this group.
    pub async fn clear(&self) -> ConfigResult<()> {
        self.value.clear().await
    }

    /// Read the node at `path` below this group without schema checks.
    ///
    /// Stored mappings are merged with the defaults registered at that path.
    /// Returns `None` if nothing is stored and no default exists.
    pub async fn get_raw(&self, path: &[&str]) -> ConfigResult<Option<JsonValue>> {
        if path.is_empty() {
            return self.get().await.map(Some);
        }
        let default = default_at(&self.defaults, path);
        let address = self.address().child_path(path.iter().copied());
        match self.value.driver.get(&address).await {
            Ok(stored) => Ok(Some(match default {
                Some(JsonValue::Object(defaults)) => merge_defaults(stored, defaults),
                _ => stored,
            })),
            Err(e) if e.is_not_found() => Ok(default.cloned()),
            Err(e) => Err(e.into()),
        }
    }

    /// Store `value` at `path` below this group without schema checks.
    pub async fn set_raw<T: Serialize + ?Sized>(&self, path: &[&str], value: &T) -> ConfigResult<()> {
        if path.is_empty() {
            return self.set(value).await;
        }
        let address = self.address().child_path(path.iter().copied());
        self.value.driver.set(&address, normalize(value)?).await?;
        Ok(())
    }

    /// Remove whatever is stored at `path` below this group.
    pub async fn clear_raw(&self, path: &[&str]) -> ConfigResult<()> {
        let address = self.address().child_path(path.iter().copied());
        self.value.driver.clear(&address).await?;
        Ok(())
    }

    /// The lock guarding read-modify-write sections on this group.
    pub fn get_lock(&self) -> PathLock {
        self.value.get_lock()
    }

    /// Open an exclusive read-modify-write section on the merged mapping.
    pub async fn acquire(&self) -> ConfigResult<ValueGuard<'_>> {
        ValueGuard::open(Target::Group(self), true).await
    }

    /// Open a read-modify-write section without taking the path lock.
    pub async fn acquire_unlocked(&self) -> ConfigResult<ValueGuard<'_>> {
        ValueGuard::open(Target::Group(self), false).await
    }

    /// Run `f` on the merged mapping inside an exclusive section and persist
    /// the result if it changed.
    pub async fn modify<R>(&self, f: impl FnOnce(&mut JsonValue) -> R) -> ConfigResult<R> {
        modify_target(Target::Group(self), f).await
    }

    /// Fallible variant of [`modify`](Self::modify); see
    /// [`Value::try_modify`].
    pub async fn try_modify<R, E>(
        &self,
        f: impl FnOnce(&mut JsonValue) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<ConfigError>,
    {
        try_modify_target(Target::Group(self), f).await
    }

    async fn read_with(&self, defaults: &Map<String, JsonValue>) -> ConfigResult<JsonValue> {
        match self.value.driver.get(self.address()).await {
            Ok(stored) => Ok(merge_defaults(stored, defaults)),
            Err(e) if e.is_not_found() => Ok(JsonValue::Object(defaults.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn child_group(&self, address: PathAddress, defaults: Map<String, JsonValue>) -> Group {
        Group::new(
            address,
            defaults,
            Arc::clone(&self.value.driver),
            Arc::clone(&self.value.locks),
            self.force_registration,
        )
    }

    fn child_value(&self, address: PathAddress, default: JsonValue) -> Value {
        Value::new(
            address,
            default,
            Arc::clone(&self.value.driver),
            Arc::clone(&self.value.locks),
        )
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("address", self.address())
            .field("defaults", &self.defaults)
            .field("force_registration", &self.force_registration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{store, CountingDriver};

    #[tokio::test]
    async fn resolve_follows_defaults() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_guild(&json!({"flags": {"a": true}, "days": 1}))
            .unwrap();
        let guild = conf.guild(5).unwrap();

        assert_eq!(guild.resolve("flags"), ChildKind::Group);
        assert_eq!(guild.resolve("days"), ChildKind::Value);
        assert_eq!(guild.resolve("other"), ChildKind::Unregistered);
        assert!(guild.is_group("flags"));
        assert!(guild.is_value("days"));

        let flags = guild.child("flags").unwrap().into_group().unwrap();
        assert_eq!(flags.address().nested_path(), ["flags".to_string()]);
        let days = guild.child("days").unwrap().into_value().unwrap();
        assert_eq!(days.default_value(), json!(1));
        let other = guild.child("other").unwrap().into_value().unwrap();
        assert_eq!(other.default_value(), JsonValue::Null);
    }

    #[tokio::test]
    async fn forced_registration_rejects_unknown_keys() {
        let (_ctx, conf) = store(CountingDriver::new(), true).await;
        conf.register_guild(&json!({"days": 1})).unwrap();
        let guild = conf.guild(5).unwrap();
        assert!(matches!(
            guild.child("typo"),
            Err(ConfigError::NotRegistered { ref key }) if key == "typo"
        ));
        assert!(guild.value("days").is_ok());
    }

    #[tokio::test]
    async fn merged_read_keeps_stored_and_fills_defaults() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_guild(&json!({"threshold": 5, "flags": {"a": true, "b": false}}))
            .unwrap();
        let guild = conf.guild(7).unwrap();
        guild
            .set(&json!({"flags": {"b": true, "c": 1}}))
            .await
            .unwrap();

        assert_eq!(
            guild.get().await.unwrap(),
            json!({"threshold": 5, "flags": {"a": true, "b": true, "c": 1}})
        );
        let flags = guild.group("flags").unwrap();
        assert_eq!(flags.get().await.unwrap(), json!({"a": true, "b": true, "c": 1}));
    }

    #[tokio::test]
    async fn unset_group_reads_defaults() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_user(&json!({"names": [], "karma": 0})).unwrap();
        let user = conf.user(3).unwrap();
        assert_eq!(
            user.all().await.unwrap(),
            *json!({"names": [], "karma": 0}).as_object().unwrap()
        );
        let mut overridden = Map::new();
        overridden.insert("karma".into(), json!(10));
        assert_eq!(user.get_or(overridden).await.unwrap(), json!({"karma": 10}));
    }

    #[tokio::test]
    async fn group_section_writes_only_when_changed() {
        let driver = CountingDriver::new();
        let (_ctx, conf) = store(driver.clone(), false).await;
        let group = conf.global_group().unwrap().group("stats").unwrap();
        group.set(&json!({"x": 1})).await.unwrap();
        assert_eq!(driver.writes(), 1);

        let mut guard = group.acquire().await.unwrap();
        guard["y"] = json!(2);
        assert!(guard.commit().await.unwrap());
        assert_eq!(group.get().await.unwrap(), json!({"x": 1, "y": 2}));
        assert_eq!(driver.writes(), 2);

        let guard = group.acquire().await.unwrap();
        assert!(!guard.commit().await.unwrap());
        assert_eq!(driver.writes(), 2);
    }

    #[tokio::test]
    async fn global_scenario_through_store() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_global(&json!({"threshold": 5, "flags": {"a": true, "b": false}}))
            .unwrap();
        let global = conf.global_group().unwrap();
        global
            .set(&json!({"flags": {"b": true, "c": 1}}))
            .await
            .unwrap();

        let other_ref = conf.global_group().unwrap();
        assert_eq!(
            other_ref.get().await.unwrap(),
            json!({"threshold": 5, "flags": {"a": true, "b": true, "c": 1}})
        );
    }

    #[tokio::test]
    async fn group_modify_sees_merged_mapping() {
        let driver = CountingDriver::new();
        let (_ctx, conf) = store(driver.clone(), false).await;
        conf.register_guild(&json!({"days": 1, "names": []})).unwrap();
        let guild = conf.guild(3).unwrap();

        let days = guild
            .modify(|g| {
                g["names"].as_array_mut().unwrap().push(json!("mod"));
                g["days"].clone()
            })
            .await
            .unwrap();
        assert_eq!(days, json!(1));
        assert_eq!(
            guild.get().await.unwrap(),
            json!({"days": 1, "names": ["mod"]})
        );
        assert_eq!(driver.writes(), 1);

        guild.modify(|_| ()).await.unwrap();
        assert_eq!(driver.writes(), 1);
    }

    #[tokio::test]
    async fn group_try_modify_persists_before_error() {
        let driver = CountingDriver::new();
        let (_ctx, conf) = store(driver.clone(), false).await;
        let guild = conf.guild(3).unwrap();

        let result: Result<(), ConfigError> = guild
            .try_modify(|g| {
                g["seen"] = json!(true);
                Err(ConfigError::NotAGroup { key: "seen".into() })
            })
            .await;
        assert!(matches!(result, Err(ConfigError::NotAGroup { .. })));
        assert_eq!(guild.get().await.unwrap(), json!({"seen": true}));
        assert_eq!(driver.writes(), 1);
    }

    #[tokio::test]
    async fn group_unlocked_section_skips_lock_but_writes() {
        let (ctx, conf) = store(CountingDriver::new(), false).await;
        let guild = conf.guild(3).unwrap();

        let _held = guild.get_lock().lock().await;
        let mut guard = guild.acquire_unlocked().await.unwrap();
        assert!(!guard.is_locked());
        guard["k"] = json!("v");
        assert!(guard.commit().await.unwrap());
        assert_eq!(guild.get().await.unwrap(), json!({"k": "v"}));
        assert_eq!(ctx.locks().len(), 1);
    }

    #[tokio::test]
    async fn set_requires_mapping() {
        let driver = CountingDriver::new();
        let (_ctx, conf) = store(driver.clone(), false).await;
        let guild = conf.guild(1).unwrap();
        let err = guild.set(&json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, ConfigError::GroupRequiresMapping { found: "array" }));
        assert_eq!(driver.writes(), 0);
    }

    #[tokio::test]
    async fn raw_paths_bypass_schema() {
        let (_ctx, conf) = store(CountingDriver::new(), true).await;
        conf.register_guild(&json!({"limits": {"soft": 1, "hard": 2}}))
            .unwrap();
        let guild = conf.guild(1).unwrap();

        assert_eq!(
            guild.get_raw(&["limits"]).await.unwrap(),
            Some(json!({"soft": 1, "hard": 2}))
        );
        assert_eq!(guild.get_raw(&["missing", "deep"]).await.unwrap(), None);

        guild.set_raw(&["limits", "soft"], &5).await.unwrap();
        guild.set_raw(&["extra", "tag"], "x").await.unwrap();
        assert_eq!(
            guild.get_raw(&["limits"]).await.unwrap(),
            Some(json!({"soft": 5, "hard": 2}))
        );
        assert_eq!(guild.get_raw(&["extra", "tag"]).await.unwrap(), Some(json!("x")));

        guild.clear_raw(&["extra"]).await.unwrap();
        guild.clear_raw(&["extra"]).await.unwrap();
        assert_eq!(guild.get_raw(&["extra", "tag"]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn value_on_group_key_is_unmerged() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_guild(&json!({"flags": {"a": true}})).unwrap();
        let guild = conf.guild(1).unwrap();
        let flags = guild.value("flags").unwrap();
        assert_eq!(flags.default_value(), json!({"a": true}));

        flags.set(&json!({"b": false})).await.unwrap();
        assert_eq!(flags.get().await.unwrap(), json!({"b": false}));
        assert_eq!(
            guild.group("flags").unwrap().get().await.unwrap(),
            json!({"a": true, "b": false})
        );
    }

    #[tokio::test]
    async fn group_on_leaf_key_fails() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_guild(&json!({"days": 1})).unwrap();
        let guild = conf.guild(1).unwrap();
        assert!(matches!(guild.group("days"), Err(ConfigError::NotAGroup { .. })));
        let dynamic = guild.group("dynamic").unwrap();
        assert!(dynamic.defaults().is_empty());
    }

    #[tokio::test]
    async fn group_clear_restores_defaults() {
        let (_ctx, conf) = store(CountingDriver::new(), false).await;
        conf.register_member(&json!({"warnings": 0})).unwrap();
        let member = conf.member(1, 2).unwrap();
        member.set(&json!({"warnings": 3})).await.unwrap();
        member.clear().await.unwrap();
        assert_eq!(member.get().await.unwrap(), json!({"warnings": 0}));
    }
}

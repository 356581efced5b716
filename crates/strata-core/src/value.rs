//! Leaf accessor and the scoped read-modify-write guard.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use strata_driver::Driver;
use strata_types::{normalize, PathAddress};
use tracing::debug;

use crate::error::{json_kind, ConfigError, ConfigResult};
use crate::group::Group;
use crate::lock::{LockRegistry, PathLock, PathLockGuard};

/// A single configuration value at one address.
///
/// Cheap to build and clone; holds no data of its own beyond the default.
/// A `null` default means the value was never registered.
#[derive(Clone)]
pub struct Value {
    pub(crate) address: PathAddress,
    pub(crate) default: JsonValue,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) locks: Arc<LockRegistry>,
}

impl Value {
    pub(crate) fn new(
        address: PathAddress,
        default: JsonValue,
        driver: Arc<dyn Driver>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            address,
            default,
            driver,
            locks,
        }
    }

    pub(crate) fn with_default(mut self, default: JsonValue) -> Self {
        self.default = default;
        self
    }

    pub fn address(&self) -> &PathAddress {
        &self.address
    }

    /// Copy of the registered default.
    pub fn default_value(&self) -> JsonValue {
        self.default.clone()
    }

    /// The lock guarding read-modify-write sections on this address.
    pub fn get_lock(&self) -> PathLock {
        self.locks.get_lock(&self.address)
    }

    /// Effective value: the stored value, or a copy of the default.
    pub async fn get(&self) -> ConfigResult<JsonValue> {
        self.read_or(None).await
    }

    /// Like [`get`](Self::get) with `default` replacing the registered
    /// default for this call only.
    pub async fn get_or(&self, default: JsonValue) -> ConfigResult<JsonValue> {
        self.read_or(Some(default)).await
    }

    /// Effective value deserialized into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        Ok(serde_json::from_value(self.get().await?)?)
    }

    /// Store `value`. Mapping keys are normalized to strings.
    pub async fn set<T: Serialize + ?Sized>(&self, value: &T) -> ConfigResult<()> {
        let value = normalize(value)?;
        self.driver.set(&self.address, value).await?;
        Ok(())
    }

    /// Remove the stored value; later reads return the default.
    pub async fn clear(&self) -> ConfigResult<()> {
        self.driver.clear(&self.address).await?;
        Ok(())
    }

    /// Open an exclusive read-modify-write section.
    ///
    /// Changes reach storage only through [`ValueGuard::commit`]; a guard
    /// dropped on an early return or `?` discards them. When changes made
    /// before a failure must still be saved, use
    /// [`try_modify`](Self::try_modify), which commits on every exit.
    pub async fn acquire(&self) -> ConfigResult<ValueGuard<'_>> {
        ValueGuard::open(Target::Value(self), true).await
    }

    /// Open a read-modify-write section without taking the path lock.
    ///
    /// For callers that already hold [`get_lock`](Self::get_lock) or
    /// otherwise guarantee exclusivity.
    pub async fn acquire_unlocked(&self) -> ConfigResult<ValueGuard<'_>> {
        ValueGuard::open(Target::Value(self), false).await
    }

    /// Run `f` on the effective value inside an exclusive section and
    /// persist the result if it changed.
    pub async fn modify<R>(&self, f: impl FnOnce(&mut JsonValue) -> R) -> ConfigResult<R> {
        modify_target(Target::Value(self), f).await
    }

    /// Like [`modify`](Self::modify) for fallible bodies. Changes made before
    /// `f` failed are still persisted; the error is returned afterwards.
    pub async fn try_modify<R, E>(
        &self,
        f: impl FnOnce(&mut JsonValue) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<ConfigError>,
    {
        try_modify_target(Target::Value(self), f).await
    }

    async fn read_or(&self, default: Option<JsonValue>) -> ConfigResult<JsonValue> {
        match self.driver.get(&self.address).await {
            Ok(stored) => Ok(stored),
            Err(e) if e.is_not_found() => Ok(default.unwrap_or_else(|| self.default.clone())),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("address", &self.address)
            .field("default", &self.default)
            .finish()
    }
}

/// The accessor a read-modify-write section reads from and writes back to.
#[derive(Clone, Copy)]
pub(crate) enum Target<'a> {
    Value(&'a Value),
    Group(&'a Group),
}

impl Target<'_> {
    fn value(&self) -> &Value {
        match self {
            Target::Value(value) => value,
            Target::Group(group) => group.as_value(),
        }
    }

    async fn read(&self) -> ConfigResult<JsonValue> {
        match self {
            Target::Value(value) => value.get().await,
            Target::Group(group) => group.get().await,
        }
    }

    async fn write(&self, value: &JsonValue) -> ConfigResult<()> {
        match self {
            Target::Value(v) => v.set(value).await,
            Target::Group(group) => group.set(value).await,
        }
    }
}

/// Mutable working copy of a value inside a read-modify-write section.
///
/// Dereferences to the effective value read when the section opened.
/// [`commit`](Self::commit) writes it back if it differs from that initial
/// read. Dropping the guard without committing (an early return, or the
/// owning task being cancelled) discards the changes; the path lock, if one
/// was taken, is released either way.
#[must_use = "changes are discarded unless the guard is committed"]
pub struct ValueGuard<'a> {
    target: Target<'a>,
    working: JsonValue,
    snapshot: JsonValue,
    lock: Option<PathLockGuard>,
}

impl<'a> ValueGuard<'a> {
    pub(crate) async fn open(target: Target<'a>, acquire_lock: bool) -> ConfigResult<Self> {
        let lock = if acquire_lock {
            Some(target.value().get_lock().lock().await)
        } else {
            None
        };
        let working = target.read().await?;
        if !(working.is_array() || working.is_object()) {
            return Err(ConfigError::NotMutable {
                found: json_kind(&working),
            });
        }
        Ok(Self {
            target,
            snapshot: working.clone(),
            working,
            lock,
        })
    }

    pub fn address(&self) -> &PathAddress {
        self.target.value().address()
    }

    /// Returns `true` if the working copy differs from the initial read.
    pub fn is_dirty(&self) -> bool {
        self.working != self.snapshot
    }

    /// Whether this section holds the path lock.
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Persist the working copy if it changed, then end the section.
    ///
    /// Returns `true` if a write was made. Both sides of the comparison are
    /// already in stored (string-keyed) form, so key normalization alone
    /// never causes a write.
    #[must_use = "the result reports whether the write-back failed"]
    pub async fn commit(self) -> ConfigResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let ValueGuard {
            target,
            working,
            lock,
            ..
        } = self;
        target.write(&working).await?;
        debug!(address = %target.value().address(), "read-modify-write committed");
        drop(lock);
        Ok(true)
    }
}

impl Deref for ValueGuard<'_> {
    type Target = JsonValue;

    fn deref(&self) -> &JsonValue {
        &self.working
    }
}

impl DerefMut for ValueGuard<'_> {
    fn deref_mut(&mut self) -> &mut JsonValue {
        &mut self.working
    }
}

impl std::fmt::Debug for ValueGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueGuard")
            .field("address", self.address())
            .field("dirty", &self.is_dirty())
            .field("locked", &self.is_locked())
            .finish()
    }
}

pub(crate) async fn modify_target<R>(
    target: Target<'_>,
    f: impl FnOnce(&mut JsonValue) -> R,
) -> ConfigResult<R> {
    let mut guard = ValueGuard::open(target, true).await?;
    let out = f(&mut guard.working);
    guard.commit().await?;
    Ok(out)
}

pub(crate) async fn try_modify_target<R, E>(
    target: Target<'_>,
    f: impl FnOnce(&mut JsonValue) -> Result<R, E>,
) -> Result<R, E>
where
    E: From<ConfigError>,
{
    let mut guard = ValueGuard::open(target, true).await?;
    let out = f(&mut guard.working);
    guard.commit().await?;
    out
}

//! Error types for configuration operations.

use strata_driver::DriverError;
use strata_types::AddressError;
use thiserror::Error;

/// Errors that can occur while reading or writing configuration.
///
/// Everything except [`ConfigError::Driver`] and
/// [`ConfigError::Serialization`] signals a mistake in the calling code; see
/// [`ConfigError::is_contract_violation`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A key outside the registered schema was accessed under forced
    /// registration.
    #[error("'{key}' is not a valid registered group or value")]
    NotRegistered { key: String },

    /// A group can only hold a mapping.
    #[error("the value of a group must be a mapping, got {found}")]
    GroupRequiresMapping { found: &'static str },

    /// Read-modify-write needs an array or object to mutate in place.
    #[error("read-modify-write needs a mutable container (array or object), got {found}")]
    NotMutable { found: &'static str },

    /// A child that is not a group was accessed as one.
    #[error("'{key}' is registered as a value, not a group")]
    NotAGroup { key: String },

    /// Invalid address, e.g. too many primary keys.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// A custom category was used before `init_custom`.
    #[error("custom category {name:?} has not been initialized")]
    UnknownCategory { name: String },

    /// A custom category was re-declared with another arity.
    #[error("custom category {name:?} already takes {existing} primary keys, cannot change to {requested}")]
    CustomArityConflict {
        name: String,
        existing: usize,
        requested: usize,
    },

    /// Custom categories need at least one primary key.
    #[error("custom category {name:?} must take at least one primary key")]
    InvalidCustomArity { name: String },

    /// A registration would turn a group into a value or the other way round.
    #[error("cannot change the registered structure at {key:?}")]
    SchemaStructure { key: String },

    /// Defaults must be registered as a mapping.
    #[error("defaults must be a mapping, got {found}")]
    InvalidSchema { found: &'static str },

    /// Bulk enumeration was asked for an address with no keys left to walk.
    #[error("category {category} has no primary keys left to enumerate")]
    NothingToEnumerate { category: String },

    /// A value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ConfigError {
    /// Returns `true` for errors caused by misuse of the API rather than by
    /// storage or data problems.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, ConfigError::Driver(_) | ConfigError::Serialization(_))
    }
}

/// Convenience type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Short type name of a JSON value, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

//! Foundation types for Strata, a layered configuration store.
//!
//! Every other Strata crate depends on `strata-types`. It defines how a piece
//! of configuration is located: which owner registered it, which category it
//! belongs to, which entity it describes and which field below that entity
//! is meant.
//!
//! # Key Types
//!
//! - [`PathAddress`]: Immutable five-part address of a configuration node
//! - [`Category`]: Top-level partition with a fixed or custom primary-key arity
//! - [`normalize`]: Serialize any value into its string-keyed stored form

pub mod address;
pub mod category;
pub mod error;

pub use address::PathAddress;
pub use category::Category;
pub use error::AddressError;

/// Serialize `value` into the JSON form every driver stores.
///
/// Map keys are coerced to strings by `serde_json` (integer keys such as
/// entity ids become their decimal form), so a mapping written through any
/// path reads back with the same keys.
pub fn normalize<T: serde::Serialize + ?Sized>(
    value: &T,
) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(value)
}

use thiserror::Error;

/// Errors produced while building path addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("category {category} takes at most {arity} primary keys, got {given}")]
    ArityExceeded {
        category: String,
        arity: usize,
        given: usize,
    },

    #[error("invalid category name: {0:?}")]
    InvalidCategoryName(String),
}

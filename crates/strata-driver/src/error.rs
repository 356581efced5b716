use strata_types::PathAddress;

/// Errors from driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Nothing has been stored at exactly this address.
    #[error("no value stored at {0}")]
    NotFound(PathAddress),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend configuration could not be read.
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl DriverError {
    /// Returns `true` for the recoverable "nothing stored here" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }
}

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

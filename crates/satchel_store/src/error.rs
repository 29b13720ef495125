//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying medium cannot be reached. Callers must treat this
    /// as retryable, never fatal.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// No record exists under the given id.
    #[error("record {id} not found")]
    NotFound {
        /// The missing record id.
        id: String,
    },

    /// A write carried a version that does not exceed the stored one.
    #[error("stale version {got} for {id}: current version is {current}")]
    StaleVersion {
        /// The record id.
        id: String,
        /// The rejected version.
        got: u64,
        /// The version currently stored.
        current: u64,
    },

    /// Persisted data could not be decoded.
    #[error("store data corrupted: {0}")]
    Corrupted(String),

    /// A value could not be serialized for persistence.
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl StoreError {
    /// Returns true if the operation may succeed if retried later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(StoreError::Unavailable("disk gone".into()).is_retryable());
        assert!(!StoreError::NotFound { id: "a".into() }.is_retryable());
        assert!(!StoreError::StaleVersion {
            id: "a".into(),
            got: 1,
            current: 2
        }
        .is_retryable());
        assert!(!StoreError::Corrupted("bad cbor".into()).is_retryable());
    }

    #[test]
    fn io_errors_map_to_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::from(io);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
    }
}

//! Error types for the sync engine.

use satchel_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The engine is offline; expected while disconnected and retryable
    /// once connectivity returns.
    #[error("engine is offline")]
    Offline,

    /// The remote source of truth could not serve a request.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The durable store failed; aborts the current cycle but leaves
    /// all records untouched.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A resolver returned a record whose version does not exceed both
    /// disputed versions. The resolution is rejected and the conflict
    /// stays unresolved.
    #[error("resolver returned version {got} for {id}; must exceed {floor}")]
    ResolverPostcondition {
        /// The conflicted record id.
        id: String,
        /// The version the resolver returned.
        got: u64,
        /// The largest disputed version; valid output must exceed it.
        floor: u64,
    },

    /// A resolver failed outright; the conflict stays unresolved.
    #[error("resolver failed for {id}: {message}")]
    ResolverFailed {
        /// The conflicted record id.
        id: String,
        /// The resolver's error message.
        message: String,
    },

    /// The async runner driving the engine has stopped.
    #[error("sync runner is not running")]
    RunnerStopped,
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried on a later cycle.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Offline => true,
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::Store(e) => e.is_retryable(),
            SyncError::ResolverPostcondition { .. }
            | SyncError::ResolverFailed { .. }
            | SyncError::RunnerStopped => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::Offline.is_retryable());
        assert!(SyncError::remote_retryable("timeout").is_retryable());
        assert!(!SyncError::remote_fatal("rejected").is_retryable());
        assert!(SyncError::Store(StoreError::Unavailable("disk".into())).is_retryable());
        assert!(!SyncError::Store(StoreError::NotFound { id: "a".into() }).is_retryable());
        assert!(!SyncError::ResolverPostcondition {
            id: "a".into(),
            got: 1,
            floor: 3
        }
        .is_retryable());
    }

    #[test]
    fn display_includes_versions() {
        let err = SyncError::ResolverPostcondition {
            id: "a".into(),
            got: 2,
            floor: 5,
        };
        let text = err.to_string();
        assert!(text.contains('2'));
        assert!(text.contains('5'));
    }
}

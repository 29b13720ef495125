//! Error types for the backup engine.

use satchel_store::StoreError;
use thiserror::Error;

/// Result type for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;

/// Errors that can occur during backup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    /// No provider has been activated; uploads stay queued.
    #[error("no active backup provider")]
    NoActiveProvider,

    /// The named provider has not been registered.
    #[error("unknown backup provider: {name}")]
    UnknownProvider {
        /// The requested provider name.
        name: String,
    },

    /// The provider rejected authentication. Any previously active
    /// provider remains active.
    #[error("authentication failed for provider {name}")]
    AuthFailed {
        /// The provider that rejected authentication.
        name: String,
    },

    /// The provider could not serve a request.
    #[error("provider error: {message}")]
    Provider {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The provider has no snapshot under the given id.
    #[error("snapshot not found: {id}")]
    SnapshotNotFound {
        /// The requested snapshot id.
        id: String,
    },

    /// A restored payload does not hash to the checksum recorded at
    /// backup time. The data is not returned to the caller.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The checksum recorded in snapshot metadata.
        expected: String,
        /// The checksum of the restored payload.
        actual: String,
    },

    /// An encryption or decryption step failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Snapshot serialization failed.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// The durable store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BackupError {
    /// Creates a retryable provider error.
    pub fn provider_retryable(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable provider error.
    pub fn provider_fatal(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BackupError::NoActiveProvider => true,
            BackupError::Provider { retryable, .. } => *retryable,
            BackupError::Store(e) => e.is_retryable(),
            BackupError::UnknownProvider { .. }
            | BackupError::AuthFailed { .. }
            | BackupError::SnapshotNotFound { .. }
            | BackupError::ChecksumMismatch { .. }
            | BackupError::Crypto(_)
            | BackupError::Serialize(_) => false,
        }
    }
}

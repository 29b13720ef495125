//! Backup snapshot model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata describing a backup snapshot's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Application-defined payload kind (e.g. "user_data").
    pub kind: String,
    /// Size of the stored payload in bytes.
    pub size_bytes: u64,
    /// SHA-256 checksum of the plaintext payload, lowercase hex.
    pub checksum: String,
    /// Whether the stored payload is encrypted.
    pub encrypted: bool,
}

/// A versioned, checksummed backup payload.
///
/// Snapshots are immutable once uploaded. Corrections are new snapshots,
/// never in-place edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// Snapshot identifier (time + random component).
    pub id: String,
    /// Creation time (Unix milliseconds).
    pub created_at: u64,
    /// Schema version of the payload, for forward migration.
    pub schema_version: String,
    /// Payload bytes; encrypted when `metadata.encrypted` is true.
    pub payload: Vec<u8>,
    /// Payload metadata.
    pub metadata: SnapshotMetadata,
}

impl BackupSnapshot {
    /// Projects this snapshot down to its listing metadata.
    #[must_use]
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id.clone(),
            created_at: self.created_at,
            kind: self.metadata.kind.clone(),
            size_bytes: self.metadata.size_bytes,
            encrypted: self.metadata.encrypted,
        }
    }
}

/// Listing projection of a snapshot, as returned by provider `list()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot identifier.
    pub id: String,
    /// Creation time (Unix milliseconds).
    pub created_at: u64,
    /// Payload kind.
    pub kind: String,
    /// Stored payload size in bytes.
    pub size_bytes: u64,
    /// Whether the stored payload is encrypted.
    pub encrypted: bool,
}

/// Generates a snapshot id from a timestamp and a random component.
///
/// Collision probability is negligible: ids embed both the millisecond
/// timestamp and a v4 UUID.
#[must_use]
pub fn snapshot_id(now_ms: u64) -> String {
    format!("backup-{now_ms}-{}", Uuid::new_v4().simple())
}

//! Pending-sync record model.

use crate::clock::now_ms;
use serde::{Deserialize, Serialize};

/// A locally mutated record awaiting synchronization with the remote
/// source of truth.
///
/// The `id` is caller-assigned and unique across kinds. `version` must
/// strictly increase on every local mutation of the same `id`; the store
/// rejects stale writes. `synced` stays false until the sync engine has
/// confirmed the remote accepted this exact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Application-defined record kind (e.g. "note", "preference").
    pub kind: String,
    /// Opaque payload bytes; the engine never interprets them.
    pub payload: Vec<u8>,
    /// Monotonically increasing version for this id.
    pub version: u64,
    /// Last local mutation time (Unix milliseconds).
    pub updated_at: u64,
    /// Whether the remote has accepted this exact version.
    pub synced: bool,
}

impl SyncRecord {
    /// Creates a new unsynced record stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        payload: Vec<u8>,
        version: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload,
            version,
            updated_at: now_ms(),
            synced: false,
        }
    }

    /// Returns true if this record still needs to be pushed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Returns a copy of this record marked as accepted by the remote.
    #[must_use]
    pub fn accepted(mut self) -> Self {
        self.synced = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_are_pending() {
        let record = SyncRecord::new("a", "note", vec![1, 2, 3], 1);
        assert!(record.is_pending());
        assert!(!record.synced);
        assert!(record.updated_at > 0);
    }

    #[test]
    fn accepted_flips_synced() {
        let record = SyncRecord::new("a", "note", vec![], 1).accepted();
        assert!(record.synced);
        assert!(!record.is_pending());
    }
}

//! Sync conflict model.

use crate::record::SyncRecord;
use serde::{Deserialize, Serialize};

/// How a conflict was (or should be) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Not yet resolved.
    Unset,
    /// The local version won.
    KeepLocal,
    /// The remote version won.
    KeepRemote,
    /// A merged record was produced.
    Merged,
}

/// A version dispute between a local record and the remote copy of the
/// same id.
///
/// Conflicts exist only transiently during reconciliation. They are
/// persisted only while unresolved so a future cycle can retry them;
/// they are never dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// The local record that lost the version race.
    pub local: SyncRecord,
    /// The newer record reported by the remote.
    pub remote: SyncRecord,
    /// The resolution, if one has been decided.
    pub resolution: ConflictResolution,
}

impl SyncConflict {
    /// Creates an unresolved conflict.
    #[must_use]
    pub fn new(local: SyncRecord, remote: SyncRecord) -> Self {
        Self {
            local,
            remote,
            resolution: ConflictResolution::Unset,
        }
    }

    /// The record id this conflict is about.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.local.id
    }

    /// Returns true once a resolution has been decided.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution != ConflictResolution::Unset
    }

    /// Marks the conflict with the given resolution.
    pub fn resolve(&mut self, resolution: ConflictResolution) {
        self.resolution = resolution;
    }

    /// The smallest version a valid resolution must exceed.
    #[must_use]
    pub fn version_floor(&self) -> u64 {
        self.local.version.max(self.remote.version)
    }
}

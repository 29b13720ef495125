//! The record store contract.

use crate::error::{StoreError, StoreResult};
use satchel_types::{BackupSettings, BackupSnapshot, SyncConflict, SyncRecord};

/// A partial update to a stored [`SyncRecord`]; unset fields keep their
/// current value.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    /// New payload bytes.
    pub payload: Option<Vec<u8>>,
    /// New version; must exceed the stored version.
    pub version: Option<u64>,
    /// New update timestamp (Unix milliseconds).
    pub updated_at: Option<u64>,
    /// New synced flag.
    pub synced: Option<bool>,
}

impl RecordPatch {
    /// A patch that only flips the synced flag.
    #[must_use]
    pub fn synced(value: bool) -> Self {
        Self {
            synced: Some(value),
            ..Self::default()
        }
    }

    /// Sets the update timestamp.
    #[must_use]
    pub fn with_updated_at(mut self, at_ms: u64) -> Self {
        self.updated_at = Some(at_ms);
        self
    }

    /// Applies the patch to `record`, enforcing version monotonicity.
    pub(crate) fn apply(&self, record: &mut SyncRecord) -> StoreResult<()> {
        if let Some(version) = self.version {
            if version <= record.version {
                return Err(StoreError::StaleVersion {
                    id: record.id.clone(),
                    got: version,
                    current: record.version,
                });
            }
            record.version = version;
        }
        if let Some(payload) = &self.payload {
            record.payload = payload.clone();
        }
        if let Some(updated_at) = self.updated_at {
            record.updated_at = updated_at;
        }
        if let Some(synced) = self.synced {
            record.synced = synced;
        }
        Ok(())
    }
}

/// Durable storage for all persisted sync and backup engine state.
///
/// All writes are atomic with respect to process crash. All methods are
/// safe to call from multiple threads; implementations serialize
/// mutations per table.
pub trait RecordStore: Send + Sync {
    /// Inserts or replaces the record under its id, returning the
    /// previous record if one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StaleVersion`] if a record already exists
    /// under the id with an equal or greater version.
    fn append(&self, record: SyncRecord) -> StoreResult<Option<SyncRecord>>;

    /// Looks up a record by id.
    fn get(&self, id: &str) -> StoreResult<Option<SyncRecord>>;

    /// Lists records, optionally filtered by kind.
    fn list(&self, kind: Option<&str>) -> StoreResult<Vec<SyncRecord>>;

    /// Applies a patch to the record under `id`, returning the updated
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record exists under `id`.
    fn update(&self, id: &str, patch: RecordPatch) -> StoreResult<SyncRecord>;

    /// Removes the record under `id`. Removing a missing id is a no-op.
    fn remove(&self, id: &str) -> StoreResult<()>;

    /// Appends a snapshot to the pending-backup queue.
    fn enqueue_backup(&self, snapshot: BackupSnapshot) -> StoreResult<()>;

    /// Returns the pending-backup queue in enqueue order.
    fn pending_backups(&self) -> StoreResult<Vec<BackupSnapshot>>;

    /// Removes a snapshot from the pending-backup queue by id.
    fn remove_pending_backup(&self, id: &str) -> StoreResult<()>;

    /// Persists an unresolved conflict, keyed by its local record id.
    fn save_conflict(&self, conflict: SyncConflict) -> StoreResult<()>;

    /// Returns all persisted unresolved conflicts.
    fn list_conflicts(&self) -> StoreResult<Vec<SyncConflict>>;

    /// Removes the persisted conflict for `id`. Missing ids are a no-op.
    fn remove_conflict(&self, id: &str) -> StoreResult<()>;

    /// Loads the backup-settings singleton, if one has been saved.
    fn load_settings(&self) -> StoreResult<Option<BackupSettings>>;

    /// Persists the backup-settings singleton.
    fn save_settings(&self, settings: &BackupSettings) -> StoreResult<()>;

    /// The timestamp of the last completed sync cycle, if any.
    fn last_sync_at(&self) -> StoreResult<Option<u64>>;

    /// Records the timestamp of a completed sync cycle.
    fn set_last_sync_at(&self, at_ms: u64) -> StoreResult<()>;

    /// The timestamp of the last completed backup upload, if any.
    fn last_backup_at(&self) -> StoreResult<Option<u64>>;

    /// Records the timestamp of a completed backup upload.
    fn set_last_backup_at(&self, at_ms: u64) -> StoreResult<()>;

    /// Wipes the pending-sync table, backup queue, and conflict table.
    /// Settings and timestamps are kept.
    fn clear(&self) -> StoreResult<()>;
}

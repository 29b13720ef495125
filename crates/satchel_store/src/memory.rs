//! In-memory record store for tests and ephemeral use.

use crate::error::{StoreError, StoreResult};
use crate::store::{RecordPatch, RecordStore};
use parking_lot::RwLock;
use satchel_types::{BackupSettings, BackupSnapshot, SyncConflict, SyncRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory [`RecordStore`].
///
/// Nothing survives a drop. Besides ephemeral use, this store can
/// simulate an unreachable medium via [`set_unavailable`](Self::set_unavailable),
/// which makes every operation fail with [`StoreError::Unavailable`] -
/// useful for exercising cycle-level failure paths in engine tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pending: RwLock<BTreeMap<String, SyncRecord>>,
    queue: RwLock<Vec<BackupSnapshot>>,
    conflicts: RwLock<BTreeMap<String, SyncConflict>>,
    settings: RwLock<Option<BackupSettings>>,
    last_sync_at: RwLock<Option<u64>>,
    last_backup_at: RwLock<Option<u64>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail as unavailable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, record: SyncRecord) -> StoreResult<Option<SyncRecord>> {
        self.check_available()?;
        let mut pending = self.pending.write();
        if let Some(existing) = pending.get(&record.id) {
            if record.version <= existing.version {
                return Err(StoreError::StaleVersion {
                    id: record.id.clone(),
                    got: record.version,
                    current: existing.version,
                });
            }
        }
        Ok(pending.insert(record.id.clone(), record))
    }

    fn get(&self, id: &str) -> StoreResult<Option<SyncRecord>> {
        self.check_available()?;
        Ok(self.pending.read().get(id).cloned())
    }

    fn list(&self, kind: Option<&str>) -> StoreResult<Vec<SyncRecord>> {
        self.check_available()?;
        let pending = self.pending.read();
        Ok(pending
            .values()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect())
    }

    fn update(&self, id: &str, patch: RecordPatch) -> StoreResult<SyncRecord> {
        self.check_available()?;
        let mut pending = self.pending.write();
        let record = pending
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        patch.apply(record)?;
        Ok(record.clone())
    }

    fn remove(&self, id: &str) -> StoreResult<()> {
        self.check_available()?;
        self.pending.write().remove(id);
        Ok(())
    }

    fn enqueue_backup(&self, snapshot: BackupSnapshot) -> StoreResult<()> {
        self.check_available()?;
        self.queue.write().push(snapshot);
        Ok(())
    }

    fn pending_backups(&self) -> StoreResult<Vec<BackupSnapshot>> {
        self.check_available()?;
        Ok(self.queue.read().clone())
    }

    fn remove_pending_backup(&self, id: &str) -> StoreResult<()> {
        self.check_available()?;
        self.queue.write().retain(|s| s.id != id);
        Ok(())
    }

    fn save_conflict(&self, conflict: SyncConflict) -> StoreResult<()> {
        self.check_available()?;
        self.conflicts
            .write()
            .insert(conflict.id().to_string(), conflict);
        Ok(())
    }

    fn list_conflicts(&self) -> StoreResult<Vec<SyncConflict>> {
        self.check_available()?;
        Ok(self.conflicts.read().values().cloned().collect())
    }

    fn remove_conflict(&self, id: &str) -> StoreResult<()> {
        self.check_available()?;
        self.conflicts.write().remove(id);
        Ok(())
    }

    fn load_settings(&self) -> StoreResult<Option<BackupSettings>> {
        self.check_available()?;
        Ok(self.settings.read().clone())
    }

    fn save_settings(&self, settings: &BackupSettings) -> StoreResult<()> {
        self.check_available()?;
        *self.settings.write() = Some(settings.clone());
        Ok(())
    }

    fn last_sync_at(&self) -> StoreResult<Option<u64>> {
        self.check_available()?;
        Ok(*self.last_sync_at.read())
    }

    fn set_last_sync_at(&self, at_ms: u64) -> StoreResult<()> {
        self.check_available()?;
        *self.last_sync_at.write() = Some(at_ms);
        Ok(())
    }

    fn last_backup_at(&self) -> StoreResult<Option<u64>> {
        self.check_available()?;
        Ok(*self.last_backup_at.read())
    }

    fn set_last_backup_at(&self, at_ms: u64) -> StoreResult<()> {
        self.check_available()?;
        *self.last_backup_at.write() = Some(at_ms);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.check_available()?;
        self.pending.write().clear();
        self.queue.write().clear();
        self.conflicts.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_previous_and_rejects_stale() {
        let store = MemoryStore::new();

        let prev = store.append(SyncRecord::new("a", "note", vec![1], 1)).unwrap();
        assert!(prev.is_none());

        let prev = store.append(SyncRecord::new("a", "note", vec![2], 2)).unwrap();
        assert_eq!(prev.unwrap().version, 1);

        let err = store
            .append(SyncRecord::new("a", "note", vec![3], 2))
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleVersion { .. }));
    }

    #[test]
    fn list_filters_by_kind() {
        let store = MemoryStore::new();
        store.append(SyncRecord::new("a", "note", vec![], 1)).unwrap();
        store.append(SyncRecord::new("b", "habit", vec![], 1)).unwrap();

        assert_eq!(store.list(None).unwrap().len(), 2);
        assert_eq!(store.list(Some("note")).unwrap().len(), 1);
        assert_eq!(store.list(Some("goal")).unwrap().len(), 0);
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update("ghost", RecordPatch::synced(true)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn backup_queue_preserves_order() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .enqueue_backup(BackupSnapshot {
                    id: format!("backup-{i}"),
                    created_at: i,
                    schema_version: "1".into(),
                    payload: vec![],
                    metadata: satchel_types::SnapshotMetadata {
                        kind: "user_data".into(),
                        size_bytes: 0,
                        checksum: String::new(),
                        encrypted: false,
                    },
                })
                .unwrap();
        }

        let queued = store.pending_backups().unwrap();
        assert_eq!(queued.len(), 3);
        assert_eq!(queued[0].id, "backup-0");

        store.remove_pending_backup("backup-1").unwrap();
        let queued = store.pending_backups().unwrap();
        assert_eq!(queued.len(), 2);
        assert!(queued.iter().all(|s| s.id != "backup-1"));
    }

    #[test]
    fn unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(store.list(None).is_err());
        assert!(store.append(SyncRecord::new("a", "note", vec![], 1)).is_err());
        assert!(store.last_sync_at().is_err());

        store.set_unavailable(false);
        assert!(store.list(None).is_ok());
    }

    proptest::proptest! {
        #[test]
        fn append_accepts_exactly_strictly_increasing_versions(
            versions in proptest::collection::vec(1u64..100, 1..40)
        ) {
            let store = MemoryStore::new();
            let mut high = 0u64;
            for version in versions {
                let result = store.append(SyncRecord::new("a", "note", vec![], version));
                if version > high {
                    proptest::prop_assert!(result.is_ok());
                    high = version;
                } else {
                    proptest::prop_assert!(result.is_err());
                }
                let stored = store.get("a").unwrap().unwrap();
                proptest::prop_assert_eq!(stored.version, high);
            }
        }
    }

    #[test]
    fn clear_keeps_settings_and_timestamps() {
        let store = MemoryStore::new();
        store.append(SyncRecord::new("a", "note", vec![], 1)).unwrap();
        store.save_settings(&BackupSettings::default()).unwrap();
        store.set_last_sync_at(42).unwrap();

        store.clear().unwrap();
        assert!(store.list(None).unwrap().is_empty());
        assert!(store.load_settings().unwrap().is_some());
        assert_eq!(store.last_sync_at().unwrap(), Some(42));
    }
}

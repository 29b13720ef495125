//! Crash-consistent file-backed record store.

use crate::error::{StoreError, StoreResult};
use crate::store::{RecordPatch, RecordStore};
use parking_lot::RwLock;
use satchel_types::{BackupSettings, BackupSnapshot, SyncConflict, SyncRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const PENDING_TABLE: &str = "pending";
const QUEUE_TABLE: &str = "backup_queue";
const CONFLICTS_TABLE: &str = "conflicts";
const SETTINGS_TABLE: &str = "settings";
const META_TABLE: &str = "meta";

/// Timestamps persisted alongside the tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Meta {
    last_sync_at: Option<u64>,
    last_backup_at: Option<u64>,
}

/// A file-backed [`RecordStore`].
///
/// Each logical table is one CBOR file under the store directory. Writes
/// serialize the table to a temporary file in the same directory, fsync
/// it, and rename it over the target, so a write either fully lands or
/// is absent on the next read. The in-memory copy is only committed
/// after the file write succeeds.
///
/// Every table has its own lock; reads of one table never block writers
/// of another.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    pending: RwLock<BTreeMap<String, SyncRecord>>,
    queue: RwLock<Vec<BackupSnapshot>>,
    conflicts: RwLock<BTreeMap<String, SyncConflict>>,
    settings: RwLock<Option<BackupSettings>>,
    meta: RwLock<Meta>,
}

impl FileStore {
    /// Opens a store at `dir`, creating the directory if needed and
    /// loading any previously persisted tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the directory cannot be
    /// created or read, and [`StoreError::Corrupted`] if a table file
    /// exists but cannot be decoded.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let pending: BTreeMap<String, SyncRecord> =
            read_table(&dir, PENDING_TABLE)?.unwrap_or_default();
        let queue: Vec<BackupSnapshot> = read_table(&dir, QUEUE_TABLE)?.unwrap_or_default();
        let conflicts: BTreeMap<String, SyncConflict> =
            read_table(&dir, CONFLICTS_TABLE)?.unwrap_or_default();
        let settings = read_table(&dir, SETTINGS_TABLE)?;
        let meta = read_table(&dir, META_TABLE)?.unwrap_or_default();

        tracing::debug!(
            dir = %dir.display(),
            pending = pending.len(),
            queued = queue.len(),
            conflicts = conflicts.len(),
            "store opened"
        );

        Ok(Self {
            dir,
            pending: RwLock::new(pending),
            queue: RwLock::new(queue),
            conflicts: RwLock::new(conflicts),
            settings: RwLock::new(settings),
            meta: RwLock::new(meta),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_table<T: Serialize>(&self, name: &str, value: &T) -> StoreResult<()> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let tmp = self.dir.join(format!("{name}.cbor.tmp"));
        let target = self.dir.join(format!("{name}.cbor"));

        let mut file = File::create(&tmp)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        fs::rename(&tmp, &target)?;

        // Make the rename itself durable.
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> StoreResult<Option<T>> {
    let path = dir.join(format!("{name}.cbor"));
    let buf = match fs::read(&path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Unavailable(e.to_string())),
    };
    ciborium::from_reader(buf.as_slice())
        .map(Some)
        .map_err(|e| StoreError::Corrupted(format!("{name}: {e}")))
}

impl RecordStore for FileStore {
    fn append(&self, record: SyncRecord) -> StoreResult<Option<SyncRecord>> {
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

        let mut next = pending.clone();
        let previous = next.insert(record.id.clone(), record);
        self.write_table(PENDING_TABLE, &next)?;
        *pending = next;
        Ok(previous)
    }

    fn get(&self, id: &str) -> StoreResult<Option<SyncRecord>> {
        Ok(self.pending.read().get(id).cloned())
    }

    fn list(&self, kind: Option<&str>) -> StoreResult<Vec<SyncRecord>> {
        let pending = self.pending.read();
        Ok(pending
            .values()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect())
    }

    fn update(&self, id: &str, patch: RecordPatch) -> StoreResult<SyncRecord> {
        let mut pending = self.pending.write();
        let mut next = pending.clone();
        let record = next
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        patch.apply(record)?;
        let updated = record.clone();
        self.write_table(PENDING_TABLE, &next)?;
        *pending = next;
        Ok(updated)
    }

    fn remove(&self, id: &str) -> StoreResult<()> {
        let mut pending = self.pending.write();
        if !pending.contains_key(id) {
            return Ok(());
        }
        let mut next = pending.clone();
        next.remove(id);
        self.write_table(PENDING_TABLE, &next)?;
        *pending = next;
        Ok(())
    }

    fn enqueue_backup(&self, snapshot: BackupSnapshot) -> StoreResult<()> {
        let mut queue = self.queue.write();
        let mut next = queue.clone();
        next.push(snapshot);
        self.write_table(QUEUE_TABLE, &next)?;
        *queue = next;
        Ok(())
    }

    fn pending_backups(&self) -> StoreResult<Vec<BackupSnapshot>> {
        Ok(self.queue.read().clone())
    }

    fn remove_pending_backup(&self, id: &str) -> StoreResult<()> {
        let mut queue = self.queue.write();
        let mut next = queue.clone();
        next.retain(|s| s.id != id);
        if next.len() == queue.len() {
            return Ok(());
        }
        self.write_table(QUEUE_TABLE, &next)?;
        *queue = next;
        Ok(())
    }

    fn save_conflict(&self, conflict: SyncConflict) -> StoreResult<()> {
        let mut conflicts = self.conflicts.write();
        let mut next = conflicts.clone();
        next.insert(conflict.id().to_string(), conflict);
        self.write_table(CONFLICTS_TABLE, &next)?;
        *conflicts = next;
        Ok(())
    }

    fn list_conflicts(&self) -> StoreResult<Vec<SyncConflict>> {
        Ok(self.conflicts.read().values().cloned().collect())
    }

    fn remove_conflict(&self, id: &str) -> StoreResult<()> {
        let mut conflicts = self.conflicts.write();
        if !conflicts.contains_key(id) {
            return Ok(());
        }
        let mut next = conflicts.clone();
        next.remove(id);
        self.write_table(CONFLICTS_TABLE, &next)?;
        *conflicts = next;
        Ok(())
    }

    fn load_settings(&self) -> StoreResult<Option<BackupSettings>> {
        Ok(self.settings.read().clone())
    }

    fn save_settings(&self, settings: &BackupSettings) -> StoreResult<()> {
        let mut current = self.settings.write();
        self.write_table(SETTINGS_TABLE, settings)?;
        *current = Some(settings.clone());
        Ok(())
    }

    fn last_sync_at(&self) -> StoreResult<Option<u64>> {
        Ok(self.meta.read().last_sync_at)
    }

    fn set_last_sync_at(&self, at_ms: u64) -> StoreResult<()> {
        let mut meta = self.meta.write();
        let mut next = meta.clone();
        next.last_sync_at = Some(at_ms);
        self.write_table(META_TABLE, &next)?;
        *meta = next;
        Ok(())
    }

    fn last_backup_at(&self) -> StoreResult<Option<u64>> {
        Ok(self.meta.read().last_backup_at)
    }

    fn set_last_backup_at(&self, at_ms: u64) -> StoreResult<()> {
        let mut meta = self.meta.write();
        let mut next = meta.clone();
        next.last_backup_at = Some(at_ms);
        self.write_table(META_TABLE, &next)?;
        *meta = next;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        {
            let mut pending = self.pending.write();
            self.write_table(PENDING_TABLE, &BTreeMap::<String, SyncRecord>::new())?;
            pending.clear();
        }
        {
            let mut queue = self.queue.write();
            self.write_table(QUEUE_TABLE, &Vec::<BackupSnapshot>::new())?;
            queue.clear();
        }
        {
            let mut conflicts = self.conflicts.write();
            self.write_table(CONFLICTS_TABLE, &BTreeMap::<String, SyncConflict>::new())?;
            conflicts.clear();
        }
        Ok(())
    }
}

//! Cloud storage provider abstraction.

use crate::error::{BackupError, BackupResult};
use parking_lot::RwLock;
use satchel_types::{BackupSnapshot, SnapshotInfo};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A remote destination for backup snapshots.
///
/// Providers are registered with the engine by name and activated one
/// at a time. Every activation authenticates first; an unauthenticated
/// provider never receives snapshot traffic.
pub trait CloudProvider: Send + Sync {
    /// Stable provider name used for registration and activation.
    fn name(&self) -> &str;

    /// Establishes a session with the provider.
    fn authenticate(&self) -> BackupResult<()>;

    /// Stores a snapshot. Ids are unique; re-uploading the same id
    /// overwrites the same logical object.
    fn upload(&self, snapshot: &BackupSnapshot) -> BackupResult<()>;

    /// Retrieves a snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SnapshotNotFound`] for unknown ids.
    fn download(&self, id: &str) -> BackupResult<BackupSnapshot>;

    /// Lists all stored snapshots, newest first.
    fn list(&self) -> BackupResult<Vec<SnapshotInfo>>;

    /// Deletes a snapshot by id. Deleting a missing id is a no-op.
    fn delete(&self, id: &str) -> BackupResult<()>;
}

/// An in-memory provider for tests.
///
/// Supports failing authentication, failing uploads, and corrupting
/// stored payloads to exercise restore verification.
#[derive(Debug, Default)]
pub struct MockProvider {
    name: String,
    snapshots: RwLock<BTreeMap<String, BackupSnapshot>>,
    fail_auth: AtomicBool,
    fail_uploads: AtomicBool,
    corrupt_ids: RwLock<HashSet<String>>,
    upload_count: AtomicU64,
    auth_count: AtomicU64,
}

impl MockProvider {
    /// Creates a provider with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Makes authentication fail.
    pub fn fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    /// Makes uploads fail with a retryable error.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Flips a byte in the stored payload of the given snapshot.
    pub fn corrupt(&self, id: &str) {
        self.corrupt_ids.write().insert(id.to_string());
    }

    /// Number of uploads attempted (including failed ones).
    #[must_use]
    pub fn upload_count(&self) -> u64 {
        self.upload_count.load(Ordering::SeqCst)
    }

    /// Number of authentication attempts.
    #[must_use]
    pub fn auth_count(&self) -> u64 {
        self.auth_count.load(Ordering::SeqCst)
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.snapshots.read().len()
    }
}

impl CloudProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authenticate(&self) -> BackupResult<()> {
        self.auth_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(BackupError::AuthFailed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn upload(&self, snapshot: &BackupSnapshot) -> BackupResult<()> {
        self.upload_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BackupError::provider_retryable("upload rejected"));
        }
        self.snapshots
            .write()
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    fn download(&self, id: &str) -> BackupResult<BackupSnapshot> {
        let mut snapshot = self
            .snapshots
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BackupError::SnapshotNotFound { id: id.to_string() })?;
        if self.corrupt_ids.read().contains(id) {
            if let Some(byte) = snapshot.payload.first_mut() {
                *byte ^= 0xFF;
            }
        }
        Ok(snapshot)
    }

    fn list(&self) -> BackupResult<Vec<SnapshotInfo>> {
        let mut infos: Vec<SnapshotInfo> = self
            .snapshots
            .read()
            .values()
            .map(BackupSnapshot::info)
            .collect();
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(infos)
    }

    fn delete(&self, id: &str) -> BackupResult<()> {
        self.snapshots.write().remove(id);
        Ok(())
    }
}

//! Remote source-of-truth abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use satchel_types::SyncRecord;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The remote store the engine reconciles against.
///
/// Implementations own their own timeouts; the engine treats a timeout
/// like any other retryable remote failure.
pub trait SyncRemote: Send + Sync {
    /// Fetches the remote copy of the record with the given id, if any.
    fn fetch(&self, id: &str) -> SyncResult<Option<SyncRecord>>;

    /// Pushes a local record to the remote. On success the remote holds
    /// exactly this version.
    fn push(&self, record: &SyncRecord) -> SyncResult<()>;
}

/// An in-memory remote for tests.
///
/// Supports preloading remote state, simulating unreachability, and
/// failing pushes for chosen ids. Counts fetches and pushes so tests
/// can assert on network-call volume.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    records: RwLock<BTreeMap<String, SyncRecord>>,
    reachable: AtomicBool,
    fail_push_ids: RwLock<HashSet<String>>,
    fetch_count: AtomicU64,
    push_count: AtomicU64,
}

impl MemoryRemote {
    /// Creates an empty, reachable remote.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Preloads a record as remote state.
    pub fn insert(&self, record: SyncRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    /// Returns the remote copy of a record.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SyncRecord> {
        self.records.read().get(id).cloned()
    }

    /// Sets whether the remote can be reached at all.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes pushes for the given id fail with a retryable error.
    pub fn fail_push(&self, id: &str) {
        self.fail_push_ids.write().insert(id.to_string());
    }

    /// Clears a previously installed push failure.
    pub fn heal_push(&self, id: &str) {
        self.fail_push_ids.write().remove(id);
    }

    /// Number of fetches served (including failed ones).
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of pushes attempted (including failed ones).
    #[must_use]
    pub fn push_count(&self) -> u64 {
        self.push_count.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::remote_retryable("remote unreachable"))
        }
    }
}

impl SyncRemote for MemoryRemote {
    fn fetch(&self, id: &str) -> SyncResult<Option<SyncRecord>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.records.read().get(id).cloned())
    }

    fn push(&self, record: &SyncRecord) -> SyncResult<()> {
        self.push_count.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.fail_push_ids.read().contains(&record.id) {
            return Err(SyncError::remote_retryable(format!(
                "push rejected for {}",
                record.id
            )));
        }
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_fetch_roundtrip() {
        let remote = MemoryRemote::new();
        let record = SyncRecord::new("a", "note", vec![1], 1);

        remote.push(&record).unwrap();
        let fetched = remote.fetch("a").unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(remote.push_count(), 1);
        assert_eq!(remote.fetch_count(), 1);
    }

    #[test]
    fn unreachable_remote_fails_retryably() {
        let remote = MemoryRemote::new();
        remote.set_reachable(false);

        let err = remote.fetch("a").unwrap_err();
        assert!(err.is_retryable());

        remote.set_reachable(true);
        assert!(remote.fetch("a").unwrap().is_none());
    }

    #[test]
    fn per_id_push_failure() {
        let remote = MemoryRemote::new();
        remote.fail_push("bad");

        let good = SyncRecord::new("good", "note", vec![], 1);
        let bad = SyncRecord::new("bad", "note", vec![], 1);

        remote.push(&good).unwrap();
        assert!(remote.push(&bad).is_err());

        remote.heal_push("bad");
        remote.push(&bad).unwrap();
    }
}

//! Sync engine state machine.

use crate::error::{SyncError, SyncResult};
use crate::remote::SyncRemote;
use crate::resolver::ConflictResolver;
use parking_lot::RwLock;
use satchel_store::{RecordPatch, RecordStore, StoreError};
use satchel_types::{now_ms, SyncConflict, SyncRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the event channel. Slow subscribers miss old events
/// rather than blocking the engine.
const EVENT_CAPACITY: usize = 64;

/// The current phase of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Waiting for the next trigger.
    Idle,
    /// Pushing pending records to the remote.
    Draining,
    /// Settling conflicts raised while draining.
    Reconciling,
    /// Disconnected; cycles are not started.
    Offline,
}

impl SyncPhase {
    /// Returns true while a cycle is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, SyncPhase::Draining | SyncPhase::Reconciling)
    }
}

/// Events emitted as the state machine transitions, in transition order.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A drain cycle started.
    Started,
    /// A drain cycle completed.
    Completed {
        /// Records accepted by the remote this cycle.
        synced: usize,
        /// Conflicts raised this cycle.
        conflicts: usize,
        /// Records still pending after the cycle.
        remaining: usize,
    },
    /// A cycle failed entirely; all records were left untouched.
    Failed {
        /// Description of the failure.
        error: String,
    },
    /// Connectivity was regained.
    Online,
    /// Connectivity was lost.
    Offline,
    /// A conflict could not be resolved and was persisted for retry.
    UnresolvedConflict(SyncConflict),
}

/// Snapshot of engine state for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Whether the engine currently believes it is online.
    pub online: bool,
    /// The current phase.
    pub phase: SyncPhase,
    /// Number of records awaiting sync.
    pub pending: usize,
    /// When the last cycle completed (Unix milliseconds), if ever.
    pub last_sync_at: Option<u64>,
}

/// What happened to a sync trigger.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A cycle ran to completion.
    Completed(CycleReport),
    /// Another cycle was already in flight; this trigger was dropped.
    /// The in-flight cycle only sees records written before it started,
    /// so callers needing freshness should trigger again afterwards.
    Coalesced,
}

/// Counters from a completed drain cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Records accepted by the remote.
    pub synced: usize,
    /// Conflicts raised while draining.
    pub conflicts: usize,
    /// Conflicts settled this cycle (including retries of persisted ones).
    pub resolved: usize,
    /// Conflicts left persisted for the next cycle.
    pub unresolved: usize,
    /// Records still pending after the cycle.
    pub remaining: usize,
}

/// Outcome of syncing a single record.
enum ItemOutcome {
    Synced,
    Conflicted(SyncConflict),
}

/// The synchronization engine.
///
/// Drains the durable pending queue against a [`SyncRemote`], raising
/// and settling conflicts along the way. Explicitly constructed with
/// its dependencies so multiple independent instances can coexist.
///
/// All mutating entry points are safe to call from multiple threads;
/// at most one drain cycle runs at a time and extra triggers coalesce.
pub struct SyncEngine<R: SyncRemote> {
    store: Arc<dyn RecordStore>,
    remote: Arc<R>,
    resolver: RwLock<Option<Arc<dyn ConflictResolver>>>,
    phase: RwLock<SyncPhase>,
    in_flight: AtomicBool,
    online: AtomicBool,
    pending: AtomicUsize,
    /// Unix millis of the last completed cycle; 0 means never.
    last_sync_at: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
}

impl<R: SyncRemote> SyncEngine<R> {
    /// Creates an engine over the given store and remote.
    ///
    /// The pending count and last-sync timestamp are re-read from the
    /// store, so state survives a process restart.
    pub fn new(store: Arc<dyn RecordStore>, remote: Arc<R>) -> Self {
        let pending = store
            .list(None)
            .map(|records| records.iter().filter(|r| r.is_pending()).count())
            .unwrap_or(0);
        let last_sync_at = store.last_sync_at().ok().flatten().unwrap_or(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            store,
            remote,
            resolver: RwLock::new(None),
            phase: RwLock::new(SyncPhase::Offline),
            in_flight: AtomicBool::new(false),
            online: AtomicBool::new(false),
            pending: AtomicUsize::new(pending),
            last_sync_at: AtomicU64::new(last_sync_at),
            events,
        }
    }

    /// Subscribes to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Registers the conflict resolver. Without one, conflicts resolve
    /// as "remote wins".
    pub fn set_resolver(&self, resolver: Arc<dyn ConflictResolver>) {
        *self.resolver.write() = Some(resolver);
    }

    /// Removes any registered resolver, restoring the default
    /// "remote wins" behavior.
    pub fn clear_resolver(&self) {
        *self.resolver.write() = None;
    }

    /// Records a local mutation into the durable pending queue.
    ///
    /// Constant-time from the caller's perspective: nothing is pushed
    /// over the network until the next drain cycle.
    pub fn enqueue(&self, record: SyncRecord) -> SyncResult<()> {
        let was_pending = self
            .store
            .append(record)?
            .is_some_and(|prev| prev.is_pending());
        if !was_pending {
            self.pending.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Returns a snapshot of engine state. Constant-time.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let last = self.last_sync_at.load(Ordering::SeqCst);
        SyncStatus {
            online: self.is_online(),
            phase: *self.phase.read(),
            pending: self.pending.load(Ordering::SeqCst),
            last_sync_at: (last > 0).then_some(last),
        }
    }

    /// Whether the engine currently believes it is online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns all persisted unresolved conflicts.
    pub fn unresolved_conflicts(&self) -> SyncResult<Vec<SyncConflict>> {
        Ok(self.store.list_conflicts()?)
    }

    /// Updates the engine's connectivity belief, emitting the matching
    /// event on an edge. Called by the runner on monitor transitions.
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }
        if online {
            debug!("connectivity regained");
            let _ = self.events.send(SyncEvent::Online);
            let mut phase = self.phase.write();
            if *phase == SyncPhase::Offline {
                *phase = SyncPhase::Idle;
            }
        } else {
            debug!("connectivity lost");
            let _ = self.events.send(SyncEvent::Offline);
            let mut phase = self.phase.write();
            if !phase.is_active() {
                *phase = SyncPhase::Offline;
            }
        }
    }

    /// Runs a drain cycle now.
    ///
    /// Returns [`CycleOutcome::Coalesced`] if a cycle is already in
    /// flight. Fails with [`SyncError::Offline`] while disconnected.
    pub fn force_sync(&self) -> SyncResult<CycleOutcome> {
        if !self.is_online() {
            return Err(SyncError::Offline);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("cycle already in flight; trigger coalesced");
            return Ok(CycleOutcome::Coalesced);
        }

        let result = self.run_cycle();
        self.in_flight.store(false, Ordering::SeqCst);
        result.map(CycleOutcome::Completed)
    }

    /// Wipes the pending queue and conflict table.
    pub fn clear_offline_data(&self) -> SyncResult<()> {
        self.store.clear()?;
        self.pending.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    fn run_cycle(&self) -> SyncResult<CycleReport> {
        let _ = self.events.send(SyncEvent::Started);
        self.set_phase(SyncPhase::Draining);

        let result = self.drain_and_reconcile();

        match &result {
            Ok(report) => {
                let at = now_ms();
                if let Err(e) = self.store.set_last_sync_at(at) {
                    warn!(error = %e, "failed to persist last-sync timestamp");
                } else {
                    self.last_sync_at.store(at, Ordering::SeqCst);
                }
                debug!(
                    synced = report.synced,
                    conflicts = report.conflicts,
                    remaining = report.remaining,
                    "sync cycle completed"
                );
                let _ = self.events.send(SyncEvent::Completed {
                    synced: report.synced,
                    conflicts: report.conflicts,
                    remaining: report.remaining,
                });
            }
            Err(e) => {
                warn!(error = %e, "sync cycle failed");
                let _ = self.events.send(SyncEvent::Failed {
                    error: e.to_string(),
                });
            }
        }

        self.set_phase(if self.is_online() {
            SyncPhase::Idle
        } else {
            SyncPhase::Offline
        });
        result
    }

    /// The body of a cycle. Store errors propagate and abort the whole
    /// cycle; remote errors are per-item and leave the record pending.
    fn drain_and_reconcile(&self) -> SyncResult<CycleReport> {
        let mut report = CycleReport::default();

        let records = self.store.list(None)?;
        let mut fresh: Vec<SyncConflict> = Vec::new();

        for record in records.into_iter().filter(SyncRecord::is_pending) {
            match self.sync_item(&record) {
                Ok(ItemOutcome::Synced) => report.synced += 1,
                Ok(ItemOutcome::Conflicted(conflict)) => fresh.push(conflict),
                Err(SyncError::Store(e)) => return Err(SyncError::Store(e)),
                Err(e) => {
                    // Item-level failure: the record stays pending and
                    // the rest of the batch continues.
                    warn!(id = %record.id, error = %e, "failed to sync record");
                }
            }
        }
        report.conflicts = fresh.len();

        self.set_phase(SyncPhase::Reconciling);

        // Retry conflicts persisted by earlier cycles; a fresh conflict
        // for the same id supersedes the stored one.
        let mut disputes: BTreeMap<String, SyncConflict> = self
            .store
            .list_conflicts()?
            .into_iter()
            .map(|c| (c.id().to_string(), c))
            .collect();
        for conflict in fresh {
            disputes.insert(conflict.id().to_string(), conflict);
        }

        for conflict in disputes.into_values() {
            if self.reconcile(conflict)? {
                report.resolved += 1;
            } else {
                report.unresolved += 1;
            }
        }

        let remaining = self
            .store
            .list(None)?
            .iter()
            .filter(|r| r.is_pending())
            .count();
        self.pending.store(remaining, Ordering::SeqCst);
        report.remaining = remaining;

        Ok(report)
    }

    fn sync_item(&self, record: &SyncRecord) -> SyncResult<ItemOutcome> {
        if let Some(remote) = self.remote.fetch(&record.id)? {
            if remote.version > record.version {
                debug!(id = %record.id, local = record.version, remote = remote.version, "conflict detected");
                return Ok(ItemOutcome::Conflicted(SyncConflict::new(
                    record.clone(),
                    remote,
                )));
            }
        }

        self.remote.push(record)?;
        self.store.update(
            &record.id,
            RecordPatch::synced(true).with_updated_at(now_ms()),
        )?;
        Ok(ItemOutcome::Synced)
    }

    /// Settles one conflict. Returns true if it was resolved (and its
    /// persisted copy removed), false if it remains unresolved.
    fn reconcile(&self, conflict: SyncConflict) -> SyncResult<bool> {
        let resolver = self.resolver.read().clone();

        let Some(resolver) = resolver else {
            return self.accept_remote(&conflict);
        };

        match resolver.resolve(&conflict.local, &conflict.remote) {
            Ok(resolved) => {
                let floor = conflict.version_floor();
                if resolved.version <= floor {
                    let err = SyncError::ResolverPostcondition {
                        id: conflict.id().to_string(),
                        got: resolved.version,
                        floor,
                    };
                    warn!(error = %err, "rejecting resolution");
                    self.persist_unresolved(conflict)?;
                    return Ok(false);
                }
                self.apply_resolution(&conflict, resolved)?;
                Ok(true)
            }
            Err(e) => {
                let err = SyncError::ResolverFailed {
                    id: conflict.id().to_string(),
                    message: e.to_string(),
                };
                warn!(error = %err, "conflict left unresolved");
                self.persist_unresolved(conflict)?;
                Ok(false)
            }
        }
    }

    /// Default resolution: the remote record becomes canonical locally
    /// and the pending entry is superseded.
    fn accept_remote(&self, conflict: &SyncConflict) -> SyncResult<bool> {
        let canonical = conflict.remote.clone().accepted();
        match self.store.append(canonical) {
            Ok(_) => {}
            // The local record advanced past the remote since the
            // conflict was recorded; the next drain re-evaluates it.
            Err(StoreError::StaleVersion { .. }) => {
                debug!(id = %conflict.id(), "conflict went stale; dropping");
            }
            Err(e) => return Err(SyncError::Store(e)),
        }
        self.store.remove_conflict(conflict.id())?;
        Ok(true)
    }

    /// Writes a valid resolution locally and pushes it in the same
    /// cycle. A failed push leaves the resolved record pending; the
    /// conflict itself is settled either way.
    fn apply_resolution(&self, conflict: &SyncConflict, mut resolved: SyncRecord) -> SyncResult<()> {
        resolved.synced = false;
        match self.store.append(resolved.clone()) {
            Ok(_) => {
                if let Err(e) = self.remote.push(&resolved) {
                    warn!(id = %resolved.id, error = %e, "resolution push failed; will retry");
                } else {
                    self.store.update(
                        &resolved.id,
                        RecordPatch::synced(true).with_updated_at(now_ms()),
                    )?;
                }
            }
            Err(StoreError::StaleVersion { .. }) => {
                debug!(id = %resolved.id, "resolution superseded by newer local write");
            }
            Err(e) => return Err(SyncError::Store(e)),
        }
        self.store.remove_conflict(conflict.id())?;
        Ok(())
    }

    fn persist_unresolved(&self, conflict: SyncConflict) -> SyncResult<()> {
        self.store.save_conflict(conflict.clone())?;
        let _ = self.events.send(SyncEvent::UnresolvedConflict(conflict));
        Ok(())
    }
}

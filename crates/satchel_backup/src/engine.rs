//! Backup engine: queueing, upload, restore, retention.

use crate::crypto::{BackupCipher, BackupKey};
use crate::error::{BackupError, BackupResult};
use crate::provider::CloudProvider;
use crate::schedule;
use parking_lot::RwLock;
use satchel_store::RecordStore;
use satchel_types::{
    checksum, now_ms, snapshot_id, verify, BackupSettings, BackupSnapshot, SettingsPatch,
    SnapshotInfo, SnapshotMetadata,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Current snapshot payload schema version.
const SCHEMA_VERSION: &str = "1";

const DAY_MS: u64 = 86_400_000;
const EVENT_CAPACITY: usize = 64;

/// Events emitted by the backup engine.
#[derive(Debug, Clone)]
pub enum BackupEvent {
    /// A snapshot was created and durably queued for upload.
    Queued {
        /// Snapshot id.
        id: String,
    },
    /// A queued snapshot was uploaded and dequeued.
    Completed {
        /// Snapshot id.
        id: String,
    },
    /// A queued snapshot failed to upload; it stays queued.
    Failed {
        /// Snapshot id.
        id: String,
        /// Description of the failure.
        error: String,
    },
    /// A restore began.
    RestoreStarted {
        /// Snapshot id.
        id: String,
    },
    /// A restore completed and the payload passed verification.
    RestoreCompleted {
        /// Snapshot id.
        id: String,
    },
    /// A restore failed; no data was handed to the caller.
    RestoreFailed {
        /// Snapshot id.
        id: String,
        /// Description of the failure.
        error: String,
    },
    /// A snapshot was deleted from the provider.
    Deleted {
        /// Snapshot id.
        id: String,
    },
    /// The schedule determined a backup is due.
    AutoBackupDue,
}

/// A source of backup payloads for scheduled backups.
pub trait BackupSource: Send + Sync {
    /// Payload kind recorded in snapshot metadata.
    fn kind(&self) -> &str;

    /// Produces the payload to back up.
    fn export(&self) -> BackupResult<Vec<u8>>;
}

/// A [`BackupSource`] that exports every record in the store as CBOR.
pub struct RecordExport {
    store: Arc<dyn RecordStore>,
}

impl RecordExport {
    /// Creates an export source over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

impl BackupSource for RecordExport {
    fn kind(&self) -> &str {
        "user_data"
    }

    fn export(&self) -> BackupResult<Vec<u8>> {
        let records = self.store.list(None)?;
        let mut buf = Vec::new();
        ciborium::into_writer(&records, &mut buf)
            .map_err(|e| BackupError::Serialize(e.to_string()))?;
        Ok(buf)
    }
}

/// A verified restore result.
#[derive(Debug, Clone)]
pub struct RestoredBackup {
    /// Listing metadata of the restored snapshot.
    pub info: SnapshotInfo,
    /// The decrypted, checksum-verified plaintext payload.
    pub payload: Vec<u8>,
}

/// Snapshot of backup engine state for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStatus {
    /// Whether the backup subsystem is enabled.
    pub enabled: bool,
    /// Whether scheduled backups run automatically.
    pub auto_backup: bool,
    /// Name of the active provider, if any.
    pub provider: Option<String>,
    /// Number of snapshots queued for upload.
    pub pending: usize,
    /// When the last upload completed (Unix milliseconds), if ever.
    pub last_backup_at: Option<u64>,
    /// When the next scheduled backup is due, if scheduling is on.
    pub next_due: Option<u64>,
}

/// The backup engine.
///
/// Snapshots are created locally first (checksummed, optionally
/// encrypted, durably queued) and uploaded second, so a crash or a
/// failed upload never loses a backup. Retention hides expired
/// snapshots from listings but deletes nothing until
/// [`prune_expired`](Self::prune_expired) is called.
pub struct BackupEngine {
    store: Arc<dyn RecordStore>,
    providers: RwLock<BTreeMap<String, Arc<dyn CloudProvider>>>,
    active: RwLock<Option<Arc<dyn CloudProvider>>>,
    cipher: RwLock<Option<BackupCipher>>,
    settings: RwLock<BackupSettings>,
    /// Unix millis of the last completed upload; 0 means never.
    last_backup_at: AtomicU64,
    in_flight: AtomicBool,
    events: broadcast::Sender<BackupEvent>,
}

impl BackupEngine {
    /// Creates an engine over the given store, loading persisted
    /// settings and the last-backup timestamp.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let settings = store
            .load_settings()
            .ok()
            .flatten()
            .unwrap_or_default();
        let last_backup_at = store.last_backup_at().ok().flatten().unwrap_or(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            store,
            providers: RwLock::new(BTreeMap::new()),
            active: RwLock::new(None),
            cipher: RwLock::new(None),
            settings: RwLock::new(settings),
            last_backup_at: AtomicU64::new(last_backup_at),
            in_flight: AtomicBool::new(false),
            events,
        }
    }

    /// Subscribes to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.events.subscribe()
    }

    /// Adds a provider to the registry. Registration does not activate
    /// or authenticate it.
    pub fn register_provider(&self, provider: Arc<dyn CloudProvider>) {
        self.providers
            .write()
            .insert(provider.name().to_string(), provider);
    }

    /// Activates the named provider after authenticating it.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::UnknownProvider`] for unregistered names
    /// and propagates authentication failures. On any error the
    /// previously active provider stays active.
    pub fn set_provider(&self, name: &str) -> BackupResult<()> {
        let provider = self
            .providers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BackupError::UnknownProvider {
                name: name.to_string(),
            })?;

        provider.authenticate()?;
        debug!(provider = name, "backup provider activated");
        *self.active.write() = Some(provider);
        Ok(())
    }

    /// Name of the active provider, if any.
    #[must_use]
    pub fn active_provider(&self) -> Option<String> {
        self.active.read().as_ref().map(|p| p.name().to_string())
    }

    /// Installs the encryption key used for new snapshots and for
    /// restoring encrypted ones.
    pub fn set_encryption_key(&self, key: &BackupKey) {
        *self.cipher.write() = Some(BackupCipher::new(key));
    }

    /// Returns a copy of the current settings.
    #[must_use]
    pub fn settings(&self) -> BackupSettings {
        self.settings.read().clone()
    }

    /// Applies a settings patch, persisting the result before it takes
    /// effect.
    pub fn update_settings(&self, patch: &SettingsPatch) -> BackupResult<BackupSettings> {
        let mut settings = self.settings.write();
        let mut next = settings.clone();
        patch.apply(&mut next);
        self.store.save_settings(&next)?;
        *settings = next.clone();
        Ok(next)
    }

    /// Creates a snapshot of `payload` and queues it for upload,
    /// returning the snapshot id.
    ///
    /// The checksum always covers the plaintext. If encryption is on,
    /// the payload is encrypted before it is queued, so plaintext never
    /// reaches a provider.
    ///
    /// Upload is attempted immediately but its failure does not fail
    /// this call; the snapshot stays queued for a later
    /// [`process_pending`](Self::process_pending).
    pub fn create_backup(&self, kind: &str, payload: &[u8]) -> BackupResult<String> {
        let settings = self.settings();
        let created_at = now_ms();
        let id = snapshot_id(created_at);
        let plaintext_checksum = checksum(payload);

        let stored_payload = if settings.encrypt {
            let cipher = self.cipher.read();
            let cipher = cipher
                .as_ref()
                .ok_or_else(|| BackupError::Crypto("encryption key not set".into()))?;
            cipher.encrypt(payload)?
        } else {
            payload.to_vec()
        };

        let snapshot = BackupSnapshot {
            id: id.clone(),
            created_at,
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: SnapshotMetadata {
                kind: kind.to_string(),
                size_bytes: stored_payload.len() as u64,
                checksum: plaintext_checksum,
                encrypted: settings.encrypt,
            },
            payload: stored_payload,
        };

        self.store.enqueue_backup(snapshot)?;
        let _ = self.events.send(BackupEvent::Queued { id: id.clone() });

        if let Err(e) = self.process_pending() {
            warn!(error = %e, "upload deferred; snapshot stays queued");
        }
        Ok(id)
    }

    /// Creates a backup from a [`BackupSource`], returning the snapshot
    /// id.
    pub fn backup_from(&self, source: &dyn BackupSource) -> BackupResult<String> {
        let payload = source.export()?;
        self.create_backup(source.kind(), &payload)
    }

    /// Uploads queued snapshots in enqueue order, returning how many
    /// were uploaded.
    ///
    /// The first upload failure stops the pass and leaves the rest
    /// queued. Returns 0 without touching the queue if another pass is
    /// already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NoActiveProvider`] if nothing is queued
    /// to upload against, and propagates store failures.
    pub fn process_pending(&self) -> BackupResult<usize> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(0);
        }
        let result = self.upload_queue();
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn upload_queue(&self) -> BackupResult<usize> {
        let queue = self.store.pending_backups()?;
        if queue.is_empty() {
            return Ok(0);
        }

        let provider = self
            .active
            .read()
            .clone()
            .ok_or(BackupError::NoActiveProvider)?;

        let mut uploaded = 0;
        for snapshot in queue {
            match provider.upload(&snapshot) {
                Ok(()) => {
                    self.store.remove_pending_backup(&snapshot.id)?;
                    let at = now_ms();
                    if let Err(e) = self.store.set_last_backup_at(at) {
                        warn!(error = %e, "failed to persist last-backup timestamp");
                    } else {
                        self.last_backup_at.store(at, Ordering::SeqCst);
                    }
                    debug!(id = %snapshot.id, "snapshot uploaded");
                    let _ = self.events.send(BackupEvent::Completed { id: snapshot.id });
                    uploaded += 1;
                }
                Err(e) => {
                    warn!(id = %snapshot.id, error = %e, "upload failed; snapshot stays queued");
                    let _ = self.events.send(BackupEvent::Failed {
                        id: snapshot.id,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }
        Ok(uploaded)
    }

    /// Downloads a snapshot, decrypts it if needed, and verifies its
    /// checksum before returning the plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::ChecksumMismatch`] if the payload does not
    /// hash to the checksum recorded at backup time; no data is
    /// returned in that case.
    pub fn restore(&self, id: &str) -> BackupResult<RestoredBackup> {
        let _ = self.events.send(BackupEvent::RestoreStarted { id: id.to_string() });
        match self.restore_inner(id) {
            Ok(restored) => {
                let _ = self
                    .events
                    .send(BackupEvent::RestoreCompleted { id: id.to_string() });
                Ok(restored)
            }
            Err(e) => {
                warn!(id, error = %e, "restore failed");
                let _ = self.events.send(BackupEvent::RestoreFailed {
                    id: id.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn restore_inner(&self, id: &str) -> BackupResult<RestoredBackup> {
        let provider = self
            .active
            .read()
            .clone()
            .ok_or(BackupError::NoActiveProvider)?;

        let snapshot = provider.download(id)?;
        let info = snapshot.info();

        let payload = if snapshot.metadata.encrypted {
            let cipher = self.cipher.read();
            let cipher = cipher
                .as_ref()
                .ok_or_else(|| BackupError::Crypto("encryption key not set".into()))?;
            cipher.decrypt(&snapshot.payload)?
        } else {
            snapshot.payload
        };

        if !verify(&payload, &snapshot.metadata.checksum) {
            return Err(BackupError::ChecksumMismatch {
                expected: snapshot.metadata.checksum,
                actual: checksum(&payload),
            });
        }

        Ok(RestoredBackup { info, payload })
    }

    /// Lists uploaded snapshots, newest first, hiding ones past the
    /// retention window. A retention of 0 days keeps everything.
    ///
    /// Expired snapshots still exist at the provider until
    /// [`prune_expired`](Self::prune_expired).
    pub fn list_backups(&self) -> BackupResult<Vec<SnapshotInfo>> {
        let provider = self
            .active
            .read()
            .clone()
            .ok_or(BackupError::NoActiveProvider)?;

        let retention_days = self.settings().retention_days;
        let now = now_ms();
        Ok(provider
            .list()?
            .into_iter()
            .filter(|info| !expired(info, retention_days, now))
            .collect())
    }

    /// Deletes snapshots past the retention window from the provider,
    /// returning how many were deleted.
    pub fn prune_expired(&self) -> BackupResult<usize> {
        let provider = self
            .active
            .read()
            .clone()
            .ok_or(BackupError::NoActiveProvider)?;

        let retention_days = self.settings().retention_days;
        let now = now_ms();
        let mut pruned = 0;
        for info in provider.list()? {
            if expired(&info, retention_days, now) {
                provider.delete(&info.id)?;
                debug!(id = %info.id, "expired snapshot pruned");
                let _ = self.events.send(BackupEvent::Deleted { id: info.id });
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Deletes one snapshot from the provider.
    pub fn delete_backup(&self, id: &str) -> BackupResult<()> {
        let provider = self
            .active
            .read()
            .clone()
            .ok_or(BackupError::NoActiveProvider)?;
        provider.delete(id)?;
        let _ = self.events.send(BackupEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    /// Returns a snapshot of engine state. Constant-time apart from the
    /// queue length read.
    pub fn status(&self) -> BackupResult<BackupStatus> {
        let settings = self.settings();
        let last = self.last_backup_at();
        Ok(BackupStatus {
            enabled: settings.enabled,
            auto_backup: settings.auto_backup,
            provider: self.active_provider(),
            pending: self.store.pending_backups()?.len(),
            last_backup_at: last,
            next_due: schedule::next_due(&settings, last, now_ms()),
        })
    }

    /// When the last upload completed, if ever.
    #[must_use]
    pub fn last_backup_at(&self) -> Option<u64> {
        let last = self.last_backup_at.load(Ordering::SeqCst);
        (last > 0).then_some(last)
    }

    /// Whether a scheduled backup is due right now.
    #[must_use]
    pub fn is_due(&self) -> bool {
        schedule::is_due(&self.settings(), self.last_backup_at(), now_ms())
    }

    pub(crate) fn emit_due(&self) {
        let _ = self.events.send(BackupEvent::AutoBackupDue);
    }
}

fn expired(info: &SnapshotInfo, retention_days: u32, now_ms: u64) -> bool {
    if retention_days == 0 {
        return false;
    }
    let window = u64::from(retention_days) * DAY_MS;
    now_ms.saturating_sub(info.created_at) > window
}

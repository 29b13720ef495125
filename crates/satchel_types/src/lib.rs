//! # Satchel Types
//!
//! Shared data model for the Satchel sync and backup engines.
//!
//! This crate defines:
//! - [`SyncRecord`] - a locally mutated record awaiting synchronization
//! - [`SyncConflict`] - a local/remote version dispute under reconciliation
//! - [`BackupSnapshot`] - an immutable, checksummed backup payload
//! - [`BackupSettings`] - the process-wide backup configuration singleton
//! - Checksum and version-ordering utilities shared by both engines
//!
//! ## Key Invariants
//!
//! - A record's `version` strictly increases on every local mutation
//! - `synced` is only true after the remote accepted that exact version
//! - Snapshots are immutable once uploaded; corrections are new snapshots
//! - Checksums are SHA-256 over the plaintext payload, lowercase hex

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod clock;
mod conflict;
mod record;
mod settings;
mod snapshot;
mod version;

pub use checksum::{checksum, verify};
pub use clock::now_ms;
pub use conflict::{ConflictResolution, SyncConflict};
pub use record::SyncRecord;
pub use settings::{BackupFrequency, BackupSettings, SettingsPatch};
pub use snapshot::{snapshot_id, BackupSnapshot, SnapshotInfo, SnapshotMetadata};
pub use version::next_version;

//! # Satchel Backup
//!
//! Encrypted cloud backup engine for Satchel.
//!
//! This crate provides:
//! - Snapshot creation with plaintext checksums and AES-256-GCM
//!   encryption
//! - A pluggable cloud provider abstraction with authenticate-gated
//!   activation
//! - A durable upload queue: snapshots survive crashes and failed
//!   uploads and are retried
//! - Retention filtering on listings with explicit pruning
//! - Checksum-verified restore
//! - A scheduler anchored to the persisted last-backup timestamp
//!
//! ## Data Safety
//!
//! Snapshots are queued in the durable store before any network I/O, so
//! a crash mid-upload loses nothing. Checksums always cover the
//! plaintext; a restore that fails verification returns an error, never
//! data.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crypto;
mod engine;
mod error;
mod local_disk;
mod provider;
mod runner;
pub mod schedule;

pub use crypto::{BackupCipher, BackupKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use engine::{
    BackupEngine, BackupEvent, BackupSource, BackupStatus, RecordExport, RestoredBackup,
};
pub use error::{BackupError, BackupResult};
pub use local_disk::LocalDiskProvider;
pub use provider::{CloudProvider, MockProvider};
pub use runner::{BackupRunner, BackupRunnerConfig, BackupRunnerHandle};

pub use satchel_types::{
    BackupFrequency, BackupSettings, BackupSnapshot, SettingsPatch, SnapshotInfo, SnapshotMetadata,
};

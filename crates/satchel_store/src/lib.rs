//! # Satchel Store
//!
//! Durable record store for the Satchel sync and backup engines.
//!
//! The store exclusively owns all persisted engine state:
//! - the pending-sync table, keyed by record id
//! - the pending-backup queue
//! - the unresolved-conflict table
//! - the backup-settings singleton
//! - the last-sync and last-backup timestamps
//!
//! Engines hold only transient in-memory working sets derived from the
//! store and must re-read after a crash or restart.
//!
//! ## Durability
//!
//! [`FileStore`] makes every write atomic with respect to process crash:
//! the table is serialized to a temporary file in the same directory,
//! fsynced, and renamed over the target. A write either fully lands or
//! is absent on the next read. Each logical table lives in its own file,
//! so readers of one table never block writers of another.
//!
//! ## Available stores
//!
//! - [`MemoryStore`] - for tests and ephemeral use
//! - [`FileStore`] - crash-consistent persistent storage

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{RecordPatch, RecordStore};

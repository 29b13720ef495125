//! # Satchel Sync
//!
//! Offline-first synchronization engine for Satchel.
//!
//! This crate provides:
//! - Sync state machine (idle → draining → reconciling → idle, with an
//!   offline branch driven by connectivity edges)
//! - Durable pending queue draining with per-item retry
//! - Conflict detection and pluggable resolution
//! - Debounced network monitoring
//! - An async runner wiring timers and reconnect edges to the engine
//!
//! ## Architecture
//!
//! Local mutations are enqueued into the durable store. When online, a
//! drain cycle pushes every pending record to the remote source of
//! truth; a remote copy with a newer version raises a conflict, which
//! the registered resolver settles (default: remote wins). Unresolved
//! conflicts are persisted and retried on the next cycle.
//!
//! ## Key Invariants
//!
//! - At most one drain cycle runs at a time; extra triggers coalesce
//! - A failing item never aborts the rest of the batch
//! - A resolver's output version must exceed both disputed versions
//! - Unresolved conflicts are never dropped silently
//! - Events fire in the order the state machine transitions

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod monitor;
mod remote;
mod resolver;
mod runner;

pub use engine::{CycleOutcome, CycleReport, SyncEngine, SyncEvent, SyncPhase, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use monitor::{ConnectivityProbe, ManualProbe, MonitorConfig, NetworkMonitor};
pub use remote::{MemoryRemote, SyncRemote};
pub use resolver::{ConflictResolver, MergeResolver, ResolutionStrategy, ResolverError};
pub use runner::{RunnerConfig, RunnerHandle, SyncRunner};

pub use satchel_types::{SyncConflict, SyncRecord};

//! Pluggable conflict resolution.

use satchel_types::{next_version, now_ms, SyncRecord};
use thiserror::Error;

/// Error returned by a resolver that could not settle a conflict.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResolverError(pub String);

/// A strategy for settling a local/remote version dispute.
///
/// The returned record must carry a version strictly greater than both
/// disputed versions; the engine verifies this postcondition and rejects
/// violating resolutions, leaving the conflict unresolved.
pub trait ConflictResolver: Send + Sync {
    /// Produces the single record that should win the dispute.
    fn resolve(
        &self,
        local: &SyncRecord,
        remote: &SyncRecord,
    ) -> Result<SyncRecord, ResolverError>;
}

/// Built-in side-picking strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// The local payload wins.
    KeepLocal,
    /// The remote payload wins.
    KeepRemote,
}

impl ConflictResolver for ResolutionStrategy {
    fn resolve(
        &self,
        local: &SyncRecord,
        remote: &SyncRecord,
    ) -> Result<SyncRecord, ResolverError> {
        let winner = match self {
            ResolutionStrategy::KeepLocal => local,
            ResolutionStrategy::KeepRemote => remote,
        };
        let mut resolved = winner.clone();
        resolved.version = next_version(local.version, remote.version);
        resolved.updated_at = now_ms();
        resolved.synced = false;
        Ok(resolved)
    }
}

/// A resolver that merges the two payloads with a caller-provided
/// function. Identity fields come from the local record; the version is
/// bumped past both sides.
pub struct MergeResolver<F>
where
    F: Fn(&SyncRecord, &SyncRecord) -> Result<Vec<u8>, ResolverError> + Send + Sync,
{
    merge: F,
}

impl<F> MergeResolver<F>
where
    F: Fn(&SyncRecord, &SyncRecord) -> Result<Vec<u8>, ResolverError> + Send + Sync,
{
    /// Creates a merge resolver from the given merge function.
    pub fn new(merge: F) -> Self {
        Self { merge }
    }
}

impl<F> ConflictResolver for MergeResolver<F>
where
    F: Fn(&SyncRecord, &SyncRecord) -> Result<Vec<u8>, ResolverError> + Send + Sync,
{
    fn resolve(
        &self,
        local: &SyncRecord,
        remote: &SyncRecord,
    ) -> Result<SyncRecord, ResolverError> {
        let payload = (self.merge)(local, remote)?;
        let mut resolved = local.clone();
        resolved.payload = payload;
        resolved.version = next_version(local.version, remote.version);
        resolved.updated_at = now_ms();
        resolved.synced = false;
        Ok(resolved)
    }
}

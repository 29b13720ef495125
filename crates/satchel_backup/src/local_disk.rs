//! Local-disk backup provider.
//!
//! Stores each snapshot as one CBOR file under a directory. Useful as a
//! default destination, for air-gapped devices, and as the target of
//! provider tests that need real I/O.

use crate::error::{BackupError, BackupResult};
use crate::provider::CloudProvider;
use satchel_types::{BackupSnapshot, SnapshotInfo};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const SNAPSHOT_EXT: &str = "cbor";

/// A [`CloudProvider`] backed by a local directory.
///
/// Writes are atomic with respect to process crash: the snapshot is
/// serialized to a temporary file and renamed over the target.
#[derive(Debug)]
pub struct LocalDiskProvider {
    dir: PathBuf,
}

impl LocalDiskProvider {
    /// Creates a provider rooted at `dir`. The directory is created on
    /// the first upload.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the backup directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{SNAPSHOT_EXT}"))
    }
}

fn io_err(e: std::io::Error) -> BackupError {
    BackupError::provider_retryable(e.to_string())
}

impl CloudProvider for LocalDiskProvider {
    fn name(&self) -> &str {
        "local-disk"
    }

    fn authenticate(&self) -> BackupResult<()> {
        // Local disk needs no session; just make sure the directory is
        // usable.
        fs::create_dir_all(&self.dir).map_err(io_err)
    }

    fn upload(&self, snapshot: &BackupSnapshot) -> BackupResult<()> {
        fs::create_dir_all(&self.dir).map_err(io_err)?;

        let mut buf = Vec::new();
        ciborium::into_writer(snapshot, &mut buf)
            .map_err(|e| BackupError::Serialize(e.to_string()))?;

        let target = self.snapshot_path(&snapshot.id);
        let tmp = self.dir.join(format!("{}.{SNAPSHOT_EXT}.tmp", snapshot.id));

        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(&buf).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &target).map_err(io_err)?;
        Ok(())
    }

    fn download(&self, id: &str) -> BackupResult<BackupSnapshot> {
        let buf = match fs::read(self.snapshot_path(id)) {
            Ok(buf) => buf,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackupError::SnapshotNotFound { id: id.to_string() });
            }
            Err(e) => return Err(io_err(e)),
        };
        ciborium::from_reader(buf.as_slice())
            .map_err(|e| BackupError::provider_fatal(format!("corrupt snapshot {id}: {e}")))
    }

    fn list(&self) -> BackupResult<Vec<SnapshotInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut infos = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            let buf = fs::read(&path).map_err(io_err)?;
            let snapshot: BackupSnapshot = ciborium::from_reader(buf.as_slice())
                .map_err(|e| BackupError::provider_fatal(format!("{}: {e}", path.display())))?;
            infos.push(snapshot.info());
        }
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(infos)
    }

    fn delete(&self, id: &str) -> BackupResult<()> {
        match fs::remove_file(self.snapshot_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}

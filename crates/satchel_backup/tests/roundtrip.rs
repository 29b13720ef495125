//! End-to-end backup scenarios over a file-backed store and a real
//! on-disk provider.

use satchel_backup::{
    BackupEngine, BackupError, BackupKey, CloudProvider, LocalDiskProvider, MockProvider,
    SettingsPatch,
};
use satchel_store::{FileStore, RecordStore};
use std::sync::Arc;
use tempfile::TempDir;

fn disk_engine(store_dir: &TempDir, backup_dir: &TempDir) -> BackupEngine {
    let store = Arc::new(FileStore::open(store_dir.path()).unwrap());
    let engine = BackupEngine::new(store as Arc<dyn RecordStore>);
    engine.register_provider(Arc::new(LocalDiskProvider::new(backup_dir.path())));
    engine.set_provider("local-disk").unwrap();
    engine
        .update_settings(&SettingsPatch {
            enabled: Some(true),
            ..SettingsPatch::default()
        })
        .unwrap();
    engine
}

#[test]
fn encrypted_backup_restores_across_process_restart() {
    let store_dir = TempDir::new().unwrap();
    let backup_dir = TempDir::new().unwrap();
    let key = BackupKey::generate();

    let id = {
        let engine = disk_engine(&store_dir, &backup_dir);
        engine.set_encryption_key(&key);
        engine.create_backup("user_data", b"irreplaceable notes").unwrap()
    };

    // Fresh engine, same key, same directories.
    let engine = disk_engine(&store_dir, &backup_dir);
    engine.set_encryption_key(&key);

    let restored = engine.restore(&id).unwrap();
    assert_eq!(restored.payload, b"irreplaceable notes");
    assert!(restored.info.encrypted);

    // The wrong key cannot read the snapshot.
    engine.set_encryption_key(&BackupKey::generate());
    assert!(matches!(engine.restore(&id), Err(BackupError::Crypto(_))));
}

#[test]
fn plaintext_backup_roundtrip_on_disk() {
    let store_dir = TempDir::new().unwrap();
    let backup_dir = TempDir::new().unwrap();
    let engine = disk_engine(&store_dir, &backup_dir);
    engine
        .update_settings(&SettingsPatch {
            encrypt: Some(false),
            ..SettingsPatch::default()
        })
        .unwrap();

    let id = engine.create_backup("user_data", b"plain payload").unwrap();
    let listed = engine.list_backups().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert!(!listed[0].encrypted);

    assert_eq!(engine.restore(&id).unwrap().payload, b"plain payload");
}

#[test]
fn queued_snapshot_survives_restart_and_uploads_later() {
    let store_dir = TempDir::new().unwrap();

    let provider = Arc::new(MockProvider::new("mock"));
    let id = {
        let store = Arc::new(FileStore::open(store_dir.path()).unwrap());
        let engine = BackupEngine::new(store as Arc<dyn RecordStore>);
        engine.register_provider(Arc::clone(&provider) as Arc<dyn CloudProvider>);
        engine.set_provider("mock").unwrap();
        engine
            .update_settings(&SettingsPatch {
                enabled: Some(true),
                encrypt: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();

        provider.fail_uploads(true);
        engine.create_backup("user_data", b"queued").unwrap()
    };
    assert_eq!(provider.stored(), 0);

    // Restart: the queue was durable, the upload now goes through.
    let store = Arc::new(FileStore::open(store_dir.path()).unwrap());
    let engine = BackupEngine::new(store as Arc<dyn RecordStore>);
    let provider = Arc::new(MockProvider::new("mock"));
    engine.register_provider(Arc::clone(&provider) as Arc<dyn CloudProvider>);
    engine.set_provider("mock").unwrap();

    assert_eq!(engine.status().unwrap().pending, 1);
    assert_eq!(engine.process_pending().unwrap(), 1);
    assert_eq!(engine.restore(&id).unwrap().payload, b"queued");
}

#[test]
fn delete_removes_the_snapshot_from_disk() {
    let store_dir = TempDir::new().unwrap();
    let backup_dir = TempDir::new().unwrap();
    let engine = disk_engine(&store_dir, &backup_dir);
    engine
        .update_settings(&SettingsPatch {
            encrypt: Some(false),
            ..SettingsPatch::default()
        })
        .unwrap();

    let id = engine.create_backup("user_data", b"temp").unwrap();
    assert_eq!(engine.list_backups().unwrap().len(), 1);

    engine.delete_backup(&id).unwrap();
    assert!(engine.list_backups().unwrap().is_empty());
    assert!(matches!(
        engine.restore(&id),
        Err(BackupError::SnapshotNotFound { .. })
    ));
}

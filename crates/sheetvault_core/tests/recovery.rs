//! Recovery of file-backed stores.

use sheetvault_core::{CoreError, PreferencesRecord, RecordStore, SheetRecord, StoreConfig, UserId};
use sheetvault_protocol::{SheetSummary, UserPreferences};
use sheetvault_storage::StorageError;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

fn user() -> UserId {
    UserId::new("user-1")
}

fn sheet(key: &str, version: u32) -> SheetRecord {
    SheetRecord {
        save_key: key.into(),
        version,
        version_key: 1234,
        sort_order: Some(f64::from(version)),
        deleted: false,
        summary: SheetSummary {
            job: "WHM".into(),
            name: format!("sheet {key}"),
            multi_job: false,
            level: 100,
            isync: Some(710),
        },
        payload: vec![7; 64],
    }
}

#[test]
fn reopened_store_exposes_same_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");

    {
        let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
        store.put(&user(), "a", sheet("a", 1)).unwrap();
        store.put(&user(), "a", sheet("a", 2)).unwrap();
        store.put(&user(), "b", sheet("b", 1).into_tombstone(2)).unwrap();
        store
            .put_preferences(
                &user(),
                PreferencesRecord {
                    preferences: Some(UserPreferences {
                        light_mode: true,
                        language_override: None,
                    }),
                    next_set_id: 4,
                },
            )
            .unwrap();
    }

    let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
    assert_eq!(store.get(&user(), "a"), Some(sheet("a", 2)));
    assert!(store.get(&user(), "b").unwrap().deleted);
    assert_eq!(store.get_preferences(&user()).unwrap().next_set_id, 4);
    assert_eq!(store.stats().unwrap().log_entries, 4);
    assert_eq!(store.users(), vec![user()]);
}

#[test]
fn torn_tail_is_discarded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");

    let valid_len = {
        let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
        store.put(&user(), "a", sheet("a", 1)).unwrap();
        store.stats().unwrap().log_bytes
    };

    // Half an entry header, as left by a crash mid-append.
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"SVLG\x40\x00").unwrap();
    }

    let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
    assert_eq!(store.get(&user(), "a"), Some(sheet("a", 1)));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);

    store.put(&user(), "a", sheet("a", 2)).unwrap();
    assert_eq!(store.verify().unwrap().entries, 2);
}

#[test]
fn flipped_byte_is_reported_as_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");

    {
        let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
        store.put(&user(), "a", sheet("a", 1)).unwrap();
        store.put(&user(), "a", sheet("a", 2)).unwrap();
    }

    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 4;
    bytes[middle] ^= 0x55;
    std::fs::write(&path, &bytes).unwrap();

    let err = RecordStore::open_file(&path, StoreConfig::default()).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {err}");
}

#[test]
fn missing_store_is_not_created_when_disabled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.log");

    let result = RecordStore::open_file(&path, StoreConfig::new().create_if_missing(false));
    assert!(matches!(result, Err(CoreError::StoreMissing(_))));
    assert!(!path.exists());
}

#[test]
fn second_process_is_locked_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");

    let _first = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
    let second = RecordStore::open_file(&path, StoreConfig::default());
    assert!(matches!(
        second,
        Err(CoreError::StorageUnavailable(StorageError::Locked(_)))
    ));
}

#[test]
fn compacted_file_replaces_original() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");
    let compacted_path = dir.path().join("store.log.compact");

    {
        let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
        for version in 1..=10 {
            store.put(&user(), "a", sheet("a", version)).unwrap();
        }
        let mut target = sheetvault_storage::FileBackend::open(&compacted_path).unwrap();
        let report = store.compact_into(&mut target).unwrap();
        assert_eq!(report.entries_after, 1);
    }

    std::fs::rename(&compacted_path, &path).unwrap();
    let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
    assert_eq!(store.get(&user(), "a"), Some(sheet("a", 10)));
    assert_eq!(store.stats().unwrap().log_entries, 1);
}

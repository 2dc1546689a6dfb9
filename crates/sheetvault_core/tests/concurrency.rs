//! Concurrent writers against one store.

use sheetvault_core::{CoreError, RecordStore, SheetRecord, UserId};
use sheetvault_protocol::SheetSummary;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_allocations_are_distinct() {
    let store = Arc::new(RecordStore::in_memory().unwrap());
    let user = UserId::new("user-1");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let user = user.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| store.allocate_next_set_id(&user).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "id {id} handed out twice");
        }
    }

    assert_eq!(ids.len(), 200);
    assert_eq!(store.get_preferences(&user).unwrap().next_set_id, 200);
}

#[test]
fn read_modify_write_loses_no_increments() {
    let store = Arc::new(RecordStore::in_memory().unwrap());
    let user = UserId::new("user-1");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let user = user.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    store
                        .update(&user, "counter", |current| {
                            let version = current.map_or(0, |r| r.version) + 1;
                            let record = SheetRecord {
                                save_key: String::new(),
                                version,
                                version_key: 1,
                                sort_order: None,
                                deleted: false,
                                summary: SheetSummary::default(),
                                payload: Vec::new(),
                            };
                            Ok::<_, CoreError>((Some(record), ()))
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let record = store.get(&user, "counter").unwrap();
    assert_eq!(record.version, 200);
    assert_eq!(record.save_key, "counter");
}

#[test]
fn users_do_not_share_counters() {
    let store = Arc::new(RecordStore::in_memory().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let user = UserId::new(format!("user-{n}"));
                for expected in 0..10 {
                    assert_eq!(store.allocate_next_set_id(&user).unwrap(), expected);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.stats().unwrap().users, 4);
}

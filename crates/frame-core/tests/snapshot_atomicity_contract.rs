//! Contract Test: Snapshot Atomicity
//!
//! Verifies that the snapshot only ever changes through whole transitions.
//!
//! Constraints verified:
//! - A failing transition leaves the current snapshot untouched
//! - Readers holding an old snapshot keep seeing it after a commit
//! - Every commit bumps the revision exactly once

use frame_core::{Error, SnapshotStore};
use serde_json::{Value, json};
use std::sync::Arc;

#[test]
fn failed_transition_leaves_snapshot_unchanged() {
    let store = SnapshotStore::new(["a", "b"]);
    store
        .transition(|snapshot| {
            snapshot.set("a", json!(1))?;
            Ok(())
        })
        .unwrap();
    let before = store.current();

    let result: frame_core::Result<()> = store.transition(|snapshot| {
        snapshot.set("a", json!(99))?;
        snapshot.set("b", json!(99))?;
        Err(Error::fetch("boom"))
    });

    assert!(result.is_err());
    let after = store.current();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(*before, *after);
    assert_eq!(after.value("a"), json!(1));
    assert_eq!(after.value("b"), Value::Null);
}

#[test]
fn unknown_key_discards_the_whole_transition() {
    let store = SnapshotStore::new(["a"]);

    let result = store.transition(|snapshot| {
        snapshot.set("a", json!("written"))?;
        snapshot.set("missing", json!("nope"))?;
        Ok(())
    });

    assert!(matches!(result, Err(Error::UnknownKey(_))));
    assert_eq!(store.current().value("a"), Value::Null);
    assert_eq!(store.current().revision(), 0);
}

#[test]
fn readers_keep_their_snapshot() {
    let store = SnapshotStore::new(["a"]);
    let old = store.current();

    let mut tx = store.begin();
    tx.set("a", json!("new")).unwrap();
    let new = tx.commit();

    assert_eq!(old.value("a"), Value::Null);
    assert_eq!(old.revision(), 0);
    assert_eq!(new.value("a"), json!("new"));
    assert_eq!(new.revision(), 1);
    assert_eq!(store.current().revision(), 1);
}

#[test]
fn explicit_rollback_publishes_nothing() {
    let store = SnapshotStore::new(["a"]);

    let mut tx = store.begin();
    tx.set("a", json!(1)).unwrap();
    tx.rollback();

    assert_eq!(store.current().revision(), 0);

    // The writer lock was released
    let tx = store.begin();
    assert_eq!(tx.commit().revision(), 1);
}

#[test]
fn concurrent_transitions_serialize() {
    let store = Arc::new(SnapshotStore::new(["n"]));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .transition(|snapshot| {
                            let n = snapshot.value("n").as_u64().unwrap_or(0);
                            snapshot.set("n", json!(n + 1))?;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let snapshot = store.current();
    assert_eq!(snapshot.value("n"), json!(200));
    assert_eq!(snapshot.revision(), 200);
}

//! Contract Test: Change Notification
//!
//! Verifies the "diff, don't push" rule of the trigger engine.
//!
//! Constraints verified:
//! - Committing an equal value notifies nobody
//! - Committing a different value notifies each subscriber exactly once
//! - Equality is structural, not identity
//! - Unsubscribing is idempotent and dropping a subscription unsubscribes

mod common;

use common::*;
use frame_core::{Selector, SnapshotStore, SubscriptionGroup};
use serde_json::{Value, json};

fn set(store: &SnapshotStore, key: &str, value: Value) {
    store
        .transition(|snapshot| {
            snapshot.set(key, value)?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn same_value_notifies_nobody() {
    let store = SnapshotStore::new(["k"]);
    set(&store, "k", json!("v"));

    let (seen, callback) = recorder();
    let _subscription = store.subscribe(Selector::key("k"), callback);

    set(&store, "k", json!("v"));
    assert!(recorded(&seen).is_empty());

    set(&store, "k", json!("w"));
    assert_eq!(recorded(&seen), vec![json!("w")]);
}

#[test]
fn unrelated_keys_do_not_notify() {
    let store = SnapshotStore::new(["k", "other"]);
    let (seen, callback) = recorder();
    let _subscription = store.subscribe(Selector::key("k"), callback);

    set(&store, "other", json!(1));
    set(&store, "other", json!(2));

    assert!(recorded(&seen).is_empty());
}

#[test]
fn equality_is_structural() {
    let store = SnapshotStore::new(["k"]);
    let (seen, callback) = recorder();
    let _subscription = store.subscribe(Selector::key("k"), callback);

    set(&store, "k", json!({"disks": [{"name": "sda", "used": 40}]}));
    set(&store, "k", json!({"disks": [{"name": "sda", "used": 40}]}));
    set(&store, "k", json!({"disks": [{"name": "sda", "used": 41}]}));

    assert_eq!(recorded(&seen).len(), 2);
}

#[test]
fn notifications_are_delivered_before_transition_returns() {
    let store = SnapshotStore::new(["k"]);
    let (seen, callback) = recorder();
    let _subscription = store.subscribe(Selector::key("k"), callback);

    for n in 1..=3 {
        set(&store, "k", json!(n));
        assert_eq!(recorded(&seen).len(), n);
    }
    assert_eq!(recorded(&seen), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn custom_selector_sees_derived_value() {
    let store = SnapshotStore::new(["a", "b"]);
    let (seen, callback) = recorder();
    let _subscription = store.subscribe(
        Selector::new(|snapshot| {
            let total = snapshot.value("a").as_i64().unwrap_or(0)
                + snapshot.value("b").as_i64().unwrap_or(0);
            json!(total)
        }),
        callback,
    );

    set(&store, "a", json!(2));
    set(&store, "b", json!(3));
    store
        .transition(|snapshot| {
            snapshot.set("a", json!(3))?;
            snapshot.set("b", json!(2))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(recorded(&seen), vec![json!(2), json!(5)]);
}

#[test]
fn key_subscribers_share_one_trigger() {
    let store = SnapshotStore::new(["k"]);
    let (first, first_cb) = recorder();
    let (second, second_cb) = recorder();
    let _a = store.subscribe(Selector::key("k"), first_cb);
    let _b = store.subscribe(Selector::key("k"), second_cb);

    assert_eq!(store.triggers().trigger_count(), 1);
    assert_eq!(store.triggers().subscriber_count(), 2);

    set(&store, "k", json!(true));
    assert_eq!(recorded(&first), vec![json!(true)]);
    assert_eq!(recorded(&second), vec![json!(true)]);
}

#[test]
fn unsubscribe_is_idempotent() {
    let store = SnapshotStore::new(["k"]);
    let (seen, callback) = recorder();
    let subscription = store.subscribe(Selector::key("k"), callback);

    subscription.unsubscribe();
    subscription.unsubscribe();
    drop(subscription);

    set(&store, "k", json!(1));
    assert!(recorded(&seen).is_empty());
    assert_eq!(store.triggers().subscriber_count(), 0);
}

#[test]
fn group_release_drops_every_member() {
    let store = SnapshotStore::new(["a", "b"]);
    let (seen, callback) = recorder();
    let callback = std::sync::Arc::new(callback);

    let mut group = SubscriptionGroup::new();
    for key in ["a", "b"] {
        let callback = std::sync::Arc::clone(&callback);
        group.push(store.subscribe(Selector::key(key), move |value| callback(value)));
    }
    assert_eq!(store.triggers().subscriber_count(), 2);

    group.release();
    assert_eq!(store.triggers().subscriber_count(), 0);

    set(&store, "a", json!(1));
    assert!(recorded(&seen).is_empty());
}

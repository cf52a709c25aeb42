// # Snapshot Store
//
// Holds the canonical snapshot and applies atomic, all-or-nothing
// transitions.
//
// ## Transition Semantics
//
// - A transition works on a deep copy of the current snapshot.
// - Commit publishes the copy as the new current snapshot and evaluates
//   every trigger against (old, new) before returning.
// - Rollback, an `Err` from the mutator, or a panic discards the copy; the
//   current snapshot is untouched.
// - Transitions are serialized by a writer lock, so concurrent pulls never
//   interleave partial writes and notifications follow commit order.
//
// Readers never wait on writers longer than a pointer swap: `current()`
// hands out an `Arc` to an immutable snapshot that stays valid for as long
// as the holder keeps it.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tracing::trace;

use crate::error::Result;
use crate::registry::{read, write};
use crate::trigger::{Selector, Subscription, TriggerSet};

use super::Snapshot;

/// Owner of the current snapshot and of the triggers watching it
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    triggers: TriggerSet,
}

impl SnapshotStore {
    /// Create a store whose initial snapshot holds `null` for every key
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            current: RwLock::new(Arc::new(Snapshot::new(keys))),
            writer: Mutex::new(()),
            triggers: TriggerSet::new(),
        }
    }

    /// The live snapshot
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&read(&self.current))
    }

    /// Start a transition
    ///
    /// Blocks until any other transition has committed or been discarded.
    /// The returned transaction must not be held across an `.await`.
    pub fn begin(&self) -> Transaction<'_> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.current();
        let working = Snapshot::clone(&base);

        Transaction {
            store: self,
            base,
            working,
            _writer: writer,
        }
    }

    /// Run `mutate` on a working copy, committing on `Ok` and discarding on `Err`
    pub fn transition<R>(&self, mutate: impl FnOnce(&mut Snapshot) -> Result<R>) -> Result<R> {
        let mut tx = self.begin();
        match mutate(&mut *tx) {
            Ok(result) => {
                tx.commit();
                Ok(result)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Subscribe to changes of a derived value
    pub fn subscribe<F>(&self, selector: Selector, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.triggers.subscribe(selector, callback)
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }
}

/// A scoped, mutable working copy of the current snapshot
///
/// Dropping a transaction without calling [`Transaction::commit`] discards it.
pub struct Transaction<'a> {
    store: &'a SnapshotStore,
    base: Arc<Snapshot>,
    working: Snapshot,
    _writer: MutexGuard<'a, ()>,
}

impl Transaction<'_> {
    /// The snapshot this transaction started from
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    /// Publish the working copy and notify triggers whose value changed
    pub fn commit(self) -> Arc<Snapshot> {
        let Transaction {
            store,
            base,
            mut working,
            _writer,
        } = self;

        working.stamp(base.revision() + 1);
        let committed = Arc::new(working);
        *write(&store.current) = Arc::clone(&committed);

        let notified = store.triggers.evaluate(&base, &committed);
        trace!(
            "Committed snapshot revision {} ({} notifications)",
            committed.revision(),
            notified
        );

        committed
    }

    /// Discard the working copy
    pub fn rollback(self) {
        trace!("Discarding transition from revision {}", self.base.revision());
    }
}

impl Deref for Transaction<'_> {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.working
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Snapshot {
        &mut self.working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_transition_commits() {
        let store = SnapshotStore::new(["a", "b"]);
        store
            .transition(|snapshot| {
                snapshot.set("a", json!(1))?;
                Ok(())
            })
            .unwrap();

        let current = store.current();
        assert_eq!(current.value("a"), json!(1));
        assert_eq!(current.value("b"), Value::Null);
        assert_eq!(current.revision(), 1);
    }

    #[test]
    fn test_failed_transition_leaves_store_unchanged() {
        let store = SnapshotStore::new(["a"]);
        let before = store.current();

        let result: Result<()> = store.transition(|snapshot| {
            snapshot.set("a", json!("partial"))?;
            Err(Error::Other("boom".into()))
        });

        assert!(result.is_err());
        let after = store.current();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[test]
    fn test_dropped_transaction_is_discarded() {
        let store = SnapshotStore::new(["a"]);
        {
            let mut tx = store.begin();
            tx.set("a", json!(5)).unwrap();
        }
        assert_eq!(store.current().value("a"), Value::Null);

        let mut tx = store.begin();
        tx.set("a", json!(6)).unwrap();
        tx.commit();
        assert_eq!(store.current().value("a"), json!(6));
    }

    #[test]
    fn test_old_snapshot_stays_valid() {
        let store = SnapshotStore::new(["a"]);
        let old = store.current();
        store
            .transition(|snapshot| snapshot.set("a", json!(1)).map(|_| ()))
            .unwrap();

        assert_eq!(old.value("a"), Value::Null);
        assert_eq!(store.current().value("a"), json!(1));
    }

    #[test]
    fn test_panicking_mutator_discards_working_copy() {
        let store = Arc::new(SnapshotStore::new(["a"]));
        let panicking = Arc::clone(&store);

        let outcome = std::thread::spawn(move || {
            let _ = panicking.transition(|snapshot| -> Result<()> {
                snapshot.set("a", json!(1))?;
                panic!("mutator failed");
            });
        })
        .join();

        assert!(outcome.is_err());
        assert_eq!(store.current().value("a"), Value::Null);

        // The writer lock is usable after the panic
        store
            .transition(|snapshot| snapshot.set("a", json!(2)).map(|_| ()))
            .unwrap();
        assert_eq!(store.current().value("a"), json!(2));
    }
}

//! Selector-based change notification
//!
//! A [`Trigger`] pairs a selector (a function deriving a value from a
//! snapshot) with the callbacks subscribed to it. On every commit the store
//! asks the [`TriggerSet`] to evaluate each trigger against the old and the
//! new snapshot; subscribers are called only when the derived value differs.
//!
//! ## Rules
//!
//! - Equality is structural (`serde_json::Value` equality), never identity.
//! - Key selectors are shared: every subscription to `Selector::key("cpu")`
//!   lands on the same trigger. A custom selector takes over a custom trigger
//!   whose subscribers are all gone, else it gets a fresh one.
//! - Triggers are never removed; subscribers come and go.
//! - Unsubscribing is idempotent, and dropping a [`Subscription`]
//!   unsubscribes it.
//! - Callbacks run on the committing thread while the store's writer lock is
//!   held. They must hand off any real work (send on a channel, spawn a
//!   task) and must not start another transition themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tracing::trace;

use crate::state::Snapshot;

/// Subscriber callback, invoked with the newly selected value
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

type SelectFn = dyn Fn(&Snapshot) -> Value + Send + Sync;

/// Derives the value a trigger watches
#[derive(Clone)]
pub struct Selector {
    key: Option<String>,
    select: Arc<SelectFn>,
}

impl Selector {
    /// Select the value of one key (`null` if the key is unknown)
    pub fn key(key: impl Into<String>) -> Self {
        let key = key.into();
        let lookup = key.clone();
        Self {
            key: Some(key),
            select: Arc::new(move |snapshot: &Snapshot| snapshot.value(&lookup)),
        }
    }

    /// Select an arbitrary derived value
    ///
    /// Custom selectors are never shared between subscriptions. Once every
    /// subscriber of a custom trigger is gone, the next custom subscription
    /// reuses that trigger, so the table only grows with the number of
    /// custom subscriptions alive at once.
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&Snapshot) -> Value + Send + Sync + 'static,
    {
        Self {
            key: None,
            select: Arc::new(select),
        }
    }

    /// Select the whole snapshot as one JSON object
    pub fn all() -> Self {
        Self::new(Snapshot::to_value)
    }

    /// The key this selector reads, for key selectors
    pub fn key_name(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn select(&self, snapshot: &Snapshot) -> Value {
        (self.select)(snapshot)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "Selector::key({:?})", key),
            None => f.write_str("Selector::custom"),
        }
    }
}

/// A selector and its current subscribers
struct Trigger {
    selector: Selector,
    subscribers: Vec<(u64, Callback)>,
}

#[derive(Default)]
struct TriggerTable {
    triggers: Vec<Trigger>,
    by_key: HashMap<String, usize>,
    next_id: u64,
}

impl TriggerTable {
    /// A custom trigger nobody subscribes to any more
    fn idle_custom_slot(&self) -> Option<usize> {
        self.triggers.iter().position(|trigger| {
            trigger.selector.key_name().is_none() && trigger.subscribers.is_empty()
        })
    }
}

fn lock(table: &Mutex<TriggerTable>) -> MutexGuard<'_, TriggerTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All triggers watching one snapshot store
#[derive(Default)]
pub struct TriggerSet {
    table: Arc<Mutex<TriggerTable>>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `callback` to the trigger for `selector`
    pub fn subscribe<F>(&self, selector: Selector, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut table = lock(&self.table);

        let is_key = selector.key_name().is_some();
        let existing = match selector.key_name() {
            Some(key) => table.by_key.get(key).copied(),
            None => table.idle_custom_slot(),
        };
        let index = match (existing, is_key) {
            (Some(index), true) => index,
            (Some(index), false) => {
                trace!("Reusing idle trigger #{} for {:?}", index, selector);
                table.triggers[index].selector = selector;
                index
            }
            (None, _) => {
                let index = table.triggers.len();
                if let Some(key) = selector.key_name() {
                    table.by_key.insert(key.to_string(), index);
                }
                trace!("Creating trigger #{} for {:?}", index, selector);
                table.triggers.push(Trigger {
                    selector,
                    subscribers: Vec::new(),
                });
                index
            }
        };

        let id = table.next_id;
        table.next_id += 1;
        table.triggers[index]
            .subscribers
            .push((id, Arc::new(callback)));

        Subscription {
            table: Arc::downgrade(&self.table),
            trigger: index,
            id,
        }
    }

    /// Notify subscribers of every trigger whose selected value changed
    ///
    /// Returns the number of callbacks invoked.
    pub(crate) fn evaluate(&self, old: &Snapshot, new: &Snapshot) -> usize {
        // Copy out the live subscribers so callbacks can subscribe or
        // unsubscribe without deadlocking on the table.
        let watched: Vec<(Selector, Vec<Callback>)> = {
            let table = lock(&self.table);
            table
                .triggers
                .iter()
                .filter(|trigger| !trigger.subscribers.is_empty())
                .map(|trigger| {
                    let callbacks = trigger
                        .subscribers
                        .iter()
                        .map(|(_, callback)| Arc::clone(callback))
                        .collect();
                    (trigger.selector.clone(), callbacks)
                })
                .collect()
        };

        let mut notified = 0;
        for (selector, callbacks) in watched {
            let before = selector.select(old);
            let after = selector.select(new);
            if before == after {
                continue;
            }

            trace!("{:?} changed, notifying {} subscribers", selector, callbacks.len());
            for callback in callbacks {
                callback(&after);
                notified += 1;
            }
        }

        notified
    }

    /// Number of triggers ever created
    pub fn trigger_count(&self) -> usize {
        lock(&self.table).triggers.len()
    }

    /// Number of live subscriptions across all triggers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.table)
            .triggers
            .iter()
            .map(|trigger| trigger.subscribers.len())
            .sum()
    }
}

/// Handle to one subscribed callback
///
/// Dropping the handle unsubscribes the callback.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    table: Weak<Mutex<TriggerTable>>,
    trigger: usize,
    id: u64,
}

impl Subscription {
    /// Remove the callback from its trigger
    ///
    /// Calling this more than once, or after the store is gone, is a no-op.
    pub fn unsubscribe(&self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = lock(&table);
        if let Some(trigger) = table.triggers.get_mut(self.trigger) {
            trigger.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("trigger", &self.trigger)
            .field("id", &self.id)
            .finish()
    }
}

/// A set of subscriptions released together
#[derive(Debug, Default)]
#[must_use = "dropping a SubscriptionGroup unsubscribes all of its members"]
pub struct SubscriptionGroup {
    members: Vec<Subscription>,
}

impl SubscriptionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.members.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Unsubscribe every member
    pub fn release(self) {
        drop(self);
    }
}

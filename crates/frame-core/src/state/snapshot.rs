// # Snapshot
//
// Immutable point-in-time mapping of every configured key to its last
// fetched value. Snapshots are only ever replaced wholesale by a committed
// transition; the key set is fixed when the store is created.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Key → value mapping covering exactly the configured key set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    values: Map<String, Value>,
    revision: u64,
    committed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create the initial snapshot: every key unresolved (`null`)
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            values: keys.into_iter().map(|k| (k.into(), Value::Null)).collect(),
            revision: 0,
            committed_at: Utc::now(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The value of `key`, `null` when unresolved or unknown
    pub fn value(&self, key: &str) -> Value {
        self.values.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Replace the value of a configured key, returning the previous value
    ///
    /// # Errors
    ///
    /// [`Error::UnknownKey`] if `key` is not part of the key set.
    pub fn set(&mut self, key: &str, value: Value) -> Result<Value> {
        match self.values.get_mut(key) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(Error::UnknownKey(key.to_string())),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Number of commits that led to this snapshot
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    /// The whole mapping as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub(crate) fn stamp(&mut self, revision: u64) {
        self.revision = revision;
        self.committed_at = Utc::now();
    }
}

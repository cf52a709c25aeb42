// # Action Trait
//
// Defines the interface for user-triggered operations and the name-indexed
// set the engine builds once at configuration load.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

/// Trait for action implementations
///
/// Actions receive the caller's parameters and the full [`ActionSet`] so
/// composite actions (e.g. sequences) can invoke their siblings by name.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the action
    ///
    /// # Parameters
    ///
    /// - `params`: Caller-supplied parameters (an object, possibly empty)
    /// - `actions`: Every configured action, for composition
    async fn call(&self, params: &Value, actions: &ActionSet) -> Result<Value>;
}

/// Name → action mapping, in configuration order
#[derive(Clone, Default)]
pub struct ActionSet {
    actions: IndexMap<String, Arc<dyn Action>>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; a later insert under the same name replaces the earlier one
    pub fn insert(&mut self, name: impl Into<String>, action: Box<dyn Action>) {
        self.actions.insert(name.into(), Arc::from(action));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Look up an action by name and run it
    pub async fn call(&self, name: &str, params: &Value) -> Result<Value> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| Error::UnknownAction(name.to_string()))?;

        debug!("Calling action {}", name);
        action.call(params, self).await
    }
}

impl std::fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

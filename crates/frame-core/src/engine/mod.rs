//! Frame engine
//!
//! The FrameEngine owns one dashboard: it is responsible for:
//! - Building a [`ValueDelegate`] per configured property and the action set
//! - Refreshing properties on demand (`pull`) and on a schedule (pollers)
//! - Committing fetched values to the [`SnapshotStore`] atomically
//! - Feeding subscribers and update streams with changes
//!
//! ## Architecture
//!
//! ```text
//!   pollers / pull(keys)
//!          │
//!          ▼
//! ┌──────────────────┐   fetch    ┌──────────────┐
//! │   FrameEngine    │──────────▶│ ValueSource  │ (one per property)
//! └──────────────────┘            └──────────────┘
//!          │ one transition per pull
//!          ▼
//! ┌──────────────────┐  (old, new)  ┌──────────────┐
//! │  SnapshotStore   │────────────▶│  TriggerSet  │──▶ callbacks / streams
//! └──────────────────┘              └──────────────┘
//! ```
//!
//! ## Pull Failures
//!
//! Fetches of one pull run concurrently and are cancelled when the pull
//! itself is dropped, e.g. by aborting its poller. Every key that fetched
//! successfully is committed in a single transition; afterwards, if any key
//! failed, the pull returns [`Error::PullFailed`] naming each failed key.
//! Unknown keys are rejected before anything is fetched.

mod delegate;
mod stream;

pub use delegate::ValueDelegate;
pub use stream::{RenderedUpdate, UpdateStream};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::FrameConfig;
use crate::error::{Error, FetchFailure, Result};
use crate::registry::{FactoryContext, Plugins};
use crate::state::{Snapshot, SnapshotStore};
use crate::traits::ActionSet;
use crate::trigger::{Selector, Subscription};

/// Events emitted by the FrameEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Pollers were started
    Started {
        properties: usize,
        pollers: usize,
    },

    /// A pull committed new values
    Pulled {
        keys: Vec<String>,
        revision: u64,
    },

    /// A property could not be fetched
    FetchFailed {
        key: String,
        error: String,
    },

    /// A poller was scheduled for a property
    PollerStarted {
        key: String,
        interval: Duration,
    },

    /// An existing poller was cancelled in favour of a new one
    PollerReplaced {
        key: String,
    },

    /// All pollers were cancelled
    PollersStopped {
        count: usize,
    },

    /// An action ran successfully
    ActionInvoked {
        name: String,
    },

    /// An action failed
    ActionFailed {
        name: String,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Live dashboard engine
///
/// Cheap to clone: clones share the same snapshot store, pollers and event
/// channel.
///
/// ## Lifecycle
///
/// 1. Create with [`FrameEngine::new()`]
/// 2. Either drive it yourself (`pull`, `auto_update`, `update_stream`) or
///    call [`FrameEngine::run()`]
/// 3. Dropping the last clone cancels every poller
#[derive(Clone)]
pub struct FrameEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    /// Dashboard title
    name: String,

    /// Registries the engine was built from
    plugins: Arc<Plugins>,

    /// Canonical state
    store: Arc<SnapshotStore>,

    /// Delegates in configuration order
    properties: IndexMap<String, Arc<ValueDelegate>>,

    /// Configured actions
    actions: ActionSet,

    /// At most one poller per key
    pollers: Mutex<HashMap<String, JoinHandle<()>>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let pollers = self
            .pollers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, poller) in pollers.drain() {
            poller.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameEngine {
    /// Create a new engine
    ///
    /// Applies the configuration's defaults and references to `plugins`,
    /// then resolves every property and action through the registries.
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        config: FrameConfig,
        plugins: Arc<Plugins>,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;
        plugins.apply_config(&config)?;

        let store = Arc::new(SnapshotStore::new(config.model.keys().cloned()));
        let ctx = FactoryContext::with_store(&plugins, &store);

        let mut properties = IndexMap::with_capacity(config.model.len());
        for (key, property) in &config.model {
            let delegate = ValueDelegate::build(key, property, &ctx)
                .inspect_err(|e| error!("Failed to build property {}: {}", key, e))?;
            properties.insert(key.clone(), Arc::new(delegate));
        }

        let mut actions = ActionSet::new();
        for (name, settings) in &config.actions {
            let mut settings = settings.clone();
            settings.insert("name", name.clone());
            let (action, _) = plugins
                .actions
                .make_with(settings, &ctx)
                .inspect_err(|e| error!("Failed to build action {}: {}", name, e))?;
            actions.insert(name.clone(), action);
        }

        info!(
            "Loaded {}: {} properties, {} actions",
            config.name,
            properties.len(),
            actions.len()
        );

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            inner: Arc::new(EngineInner {
                name: config.name,
                plugins,
                store,
                properties,
                actions,
                pollers: Mutex::new(HashMap::new()),
                event_tx: tx,
            }),
        };

        Ok((engine, rx))
    }

    /// Dashboard title
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Registries the engine was built from
    pub fn plugins(&self) -> &Arc<Plugins> {
        &self.inner.plugins
    }

    /// The engine's snapshot store
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    /// Property keys in configuration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.properties.keys().map(String::as_str)
    }

    /// Delegates in configuration order
    pub fn properties(&self) -> impl Iterator<Item = &ValueDelegate> {
        self.inner.properties.values().map(Arc::as_ref)
    }

    /// The delegate for `key`
    pub fn property(&self, key: &str) -> Result<&ValueDelegate> {
        self.delegate(key).map(Arc::as_ref)
    }

    /// Configured actions
    pub fn actions(&self) -> &ActionSet {
        &self.inner.actions
    }

    fn delegate(&self, key: &str) -> Result<&Arc<ValueDelegate>> {
        self.inner
            .properties
            .get(key)
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    /// Current value of `key`
    pub fn get(&self, key: &str) -> Result<Value> {
        self.delegate(key)?;
        Ok(self.inner.store.current().value(key))
    }

    /// Render `value` with the renderer of `key`
    pub fn render(&self, key: &str, value: &Value) -> Result<String> {
        Ok(self.delegate(key)?.render(value))
    }

    /// Pull `key` and render its fresh value
    pub async fn refresh_rendered(&self, key: &str) -> Result<String> {
        self.pull(&[key]).await?;
        self.render(key, &self.inner.store.current().value(key))
    }

    /// Refresh `keys` from their value sources
    ///
    /// See the module documentation for how partial failures are reported.
    pub async fn pull<K: AsRef<str>>(&self, keys: &[K]) -> Result<()> {
        let delegates = keys
            .iter()
            .map(|key| self.delegate(key.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;

        if delegates.is_empty() {
            return Ok(());
        }

        let fetches: Vec<_> = delegates
            .iter()
            .map(|delegate| {
                let delegate = Arc::clone(delegate);
                tokio::spawn(async move { delegate.fetch().await })
            })
            .collect();
        let _in_flight = AbortOnDrop(fetches.iter().map(JoinHandle::abort_handle).collect());
        let outcomes = futures::future::join_all(fetches).await;

        let mut fetched = Vec::with_capacity(delegates.len());
        let mut failures = Vec::new();
        for (delegate, outcome) in delegates.iter().zip(outcomes) {
            let key = delegate.key().to_string();
            match outcome {
                Ok(Ok(value)) => fetched.push((key, value)),
                Ok(Err(e)) => failures.push(FetchFailure {
                    key,
                    message: e.to_string(),
                }),
                Err(e) => failures.push(FetchFailure {
                    key,
                    message: format!("fetch task failed: {}", e),
                }),
            }
        }

        if !fetched.is_empty() {
            let keys: Vec<String> = fetched.iter().map(|(key, _)| key.clone()).collect();
            let snapshot = self.commit(fetched)?;
            debug!("Pulled {:?} at revision {}", keys, snapshot.revision());
            self.emit_event(EngineEvent::Pulled {
                keys,
                revision: snapshot.revision(),
            });
        }

        if failures.is_empty() {
            return Ok(());
        }

        for failure in &failures {
            warn!("Failed to fetch {}: {}", failure.key, failure.message);
            self.emit_event(EngineEvent::FetchFailed {
                key: failure.key.clone(),
                error: failure.message.clone(),
            });
        }
        Err(Error::PullFailed { failures })
    }

    fn commit(&self, fetched: Vec<(String, Value)>) -> Result<Arc<Snapshot>> {
        let mut tx = self.inner.store.begin();
        for (key, value) in fetched {
            tx.set(&key, value)?;
        }
        Ok(tx.commit())
    }

    /// Poll `key` every `interval`
    ///
    /// Replaces any poller already running for `key`; the old one is
    /// cancelled before this returns. Returns whether a poller was replaced.
    ///
    /// Must be called from within a tokio runtime.
    pub fn auto_update(&self, key: &str, interval: Duration) -> Result<bool> {
        self.delegate(key)?;
        if interval.is_zero() {
            return Err(Error::config(format!(
                "poll interval for {} must be positive",
                key
            )));
        }

        let poller = tokio::spawn(poll_loop(
            Arc::downgrade(&self.inner),
            key.to_string(),
            interval,
        ));
        let previous = lock(&self.inner.pollers).insert(key.to_string(), poller);

        let replaced = match previous {
            Some(previous) => {
                previous.abort();
                info!("Replaced poller for {} (every {:?})", key, interval);
                self.emit_event(EngineEvent::PollerReplaced {
                    key: key.to_string(),
                });
                true
            }
            None => {
                debug!("Polling {} every {:?}", key, interval);
                false
            }
        };

        self.emit_event(EngineEvent::PollerStarted {
            key: key.to_string(),
            interval,
        });

        Ok(replaced)
    }

    /// Start a poller for every property that has a poll interval
    ///
    /// Returns the number of pollers started.
    pub fn start(&self) -> Result<usize> {
        let mut started = 0;
        for delegate in self.inner.properties.values() {
            if let Some(interval) = delegate.poll_interval() {
                self.auto_update(delegate.key(), interval)?;
                started += 1;
            }
        }

        info!("Started {} pollers for {}", started, self.inner.name);
        self.emit_event(EngineEvent::Started {
            properties: self.inner.properties.len(),
            pollers: started,
        });

        Ok(started)
    }

    /// Cancel every poller; returns how many were running
    pub fn stop_pollers(&self) -> usize {
        let pollers: Vec<_> = lock(&self.inner.pollers).drain().collect();
        let count = pollers.len();
        for (key, poller) in pollers {
            debug!("Stopping poller for {}", key);
            poller.abort();
        }

        self.emit_event(EngineEvent::PollersStopped { count });
        count
    }

    /// Keys that currently have a running poller, sorted
    pub fn active_pollers(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.inner.pollers)
            .iter()
            .filter(|(_, poller)| !poller.is_finished())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Subscribe to the value chosen by `selector`
    ///
    /// The callback runs on the committing task, after each commit where
    /// the selected value changed. It must not start a transition itself.
    pub fn subscribe<F>(&self, selector: Selector, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(selector, callback)
    }

    /// Subscribe to one key and schedule an immediate refresh of it
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe_key<F>(&self, key: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.delegate(key)?;
        let subscription = self.subscribe(Selector::key(key), callback);

        let engine = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = engine.pull(&[key.as_str()]).await {
                warn!("Refresh after subscribing to {} failed: {}", key, e);
            }
        });

        Ok(subscription)
    }

    /// Invoke the action `name`
    pub async fn call(&self, name: &str, params: &Value) -> Result<Value> {
        match self.inner.actions.call(name, params).await {
            Ok(result) => {
                info!("Action {} completed", name);
                self.emit_event(EngineEvent::ActionInvoked {
                    name: name.to_string(),
                });
                Ok(result)
            }
            Err(e) => {
                error!("Action {} failed: {}", name, e);
                self.emit_event(EngineEvent::ActionFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run the engine until SIGINT
    ///
    /// Starts the pollers, then consumes an update stream (logging each
    /// update) until shutdown. Pollers are cancelled on exit.
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run the engine until `shutdown_rx` fires (or SIGINT when `None`)
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.start()?;

        let mut updates = self.update_stream();
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(update) = updates.next() => {
                    debug!("Update {}: {}", update.id, update.rendered);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(updates);
        let stopped = self.stop_pollers();
        info!("Stopped {} pollers, engine stopped", stopped);
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Emit an event to the event channel
    ///
    /// Uses try_send so a slow consumer never stalls the engine. Dropped
    /// events are logged.
    fn emit_event(&self, event: EngineEvent) {
        if let Err(e) = self.inner.event_tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    warn!("Event channel full, dropping event: {:?}", event);
                }
                mpsc::error::TrySendError::Closed(_) => {
                    debug!("Event channel closed, receiver dropped");
                }
            }
        }
    }
}

/// Aborts fetch tasks when the pull awaiting them is dropped
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Pull `key` every `interval` while the engine is alive
///
/// The first pull happens immediately. Failures are logged and the loop
/// keeps going.
async fn poll_loop(engine: Weak<EngineInner>, key: String, interval: Duration) {
    loop {
        let Some(inner) = engine.upgrade() else {
            debug!("Engine dropped, poller for {} exiting", key);
            return;
        };
        let engine_ref = FrameEngine { inner };

        if let Err(e) = engine_ref.pull(&[key.as_str()]).await {
            warn!("Poll of {} failed: {}", key, e);
        }
        drop(engine_ref);

        tokio::time::sleep(interval).await;
    }
}

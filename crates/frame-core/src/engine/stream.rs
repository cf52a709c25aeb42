// # Update Stream
//
// Converts snapshot transitions into an ordered feed of rendered updates for
// a transport (SSE or similar). Each call to `FrameEngine::update_stream`
// yields an independent stream:
//
// 1. Nothing happens until the stream is first polled.
// 2. First poll: pull every property, subscribe to every key, then emit one
//    update per key from the current snapshot, in configuration order.
// 3. Afterwards: one update per changed key, in commit order.
// 4. Dropping the stream releases all of its subscriptions at once.
//
// Subscriptions are taken before the initial snapshot is read, so a change
// committed in between can show up once more after the initial burst but is
// never lost.

use std::collections::VecDeque;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::trigger::{Selector, SubscriptionGroup};

use super::FrameEngine;

/// One rendered property update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedUpdate {
    /// Property key
    pub id: String,
    /// Rendered value
    pub rendered: String,
}

/// Lazy, infinite stream of rendered updates
pub type UpdateStream = Pin<Box<dyn Stream<Item = RenderedUpdate> + Send>>;

enum StreamState {
    Idle(FrameEngine),
    Live(LiveStream),
}

struct LiveStream {
    engine: FrameEngine,
    backlog: VecDeque<RenderedUpdate>,
    changes: mpsc::UnboundedReceiver<(String, Value)>,
    _subscriptions: SubscriptionGroup,
}

impl LiveStream {
    async fn open(engine: FrameEngine) -> Self {
        let keys: Vec<String> = engine.keys().map(str::to_string).collect();

        if let Err(e) = engine.pull(keys.as_slice()).await {
            warn!("Initial refresh for update stream incomplete: {}", e);
        }

        let (tx, changes) = mpsc::unbounded_channel();
        let mut subscriptions = SubscriptionGroup::new();
        for key in &keys {
            let tx = tx.clone();
            let id = key.clone();
            subscriptions.push(engine.subscribe(Selector::key(key.as_str()), move |value| {
                // Receiver gone means the stream is being dropped
                let _ = tx.send((id.clone(), value.clone()));
            }));
        }

        let snapshot = engine.store().current();
        let backlog = keys
            .iter()
            .filter_map(|key| engine.rendered_update(key, &snapshot.value(key)))
            .collect();

        debug!("Update stream opened with {} subscriptions", subscriptions.len());

        Self {
            engine,
            backlog,
            changes,
            _subscriptions: subscriptions,
        }
    }

    async fn next_update(&mut self) -> Option<RenderedUpdate> {
        loop {
            if let Some(update) = self.backlog.pop_front() {
                return Some(update);
            }

            let (key, value) = self.changes.recv().await?;
            if let Some(update) = self.engine.rendered_update(&key, &value) {
                return Some(update);
            }
        }
    }
}

impl FrameEngine {
    /// Open a new update stream
    pub fn update_stream(&self) -> UpdateStream {
        let initial = StreamState::Idle(self.clone());

        Box::pin(futures::stream::unfold(initial, |state| async move {
            let mut live = match state {
                StreamState::Idle(engine) => LiveStream::open(engine).await,
                StreamState::Live(live) => live,
            };

            let update = live.next_update().await?;
            Some((update, StreamState::Live(live)))
        }))
    }

    /// Render `value` as an update of `key` (None for unknown keys)
    pub fn rendered_update(&self, key: &str, value: &Value) -> Option<RenderedUpdate> {
        let delegate = self.inner.properties.get(key)?;
        Some(RenderedUpdate {
            id: key.to_string(),
            rendered: delegate.render(value),
        })
    }
}

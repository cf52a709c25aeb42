//! Test doubles and common utilities for contract tests
//!
//! Value sources here are registered on a [`Plugins`] instance as plain
//! factories. Each registration hands back a [`FetchCounter`] shared with
//! every instance the factory builds, so tests can observe fetch activity
//! without reaching into the engine.

#![allow(dead_code)]

use frame_core::traits::ValueSource;
use frame_core::{Error, FrameConfig, Plugins, PropertyConfig, Result, Settings};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared count of fetch calls
#[derive(Clone, Default)]
pub struct FetchCounter(Arc<AtomicUsize>);

impl FetchCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// A source that cycles through a fixed list of values
pub struct ScriptedSource {
    values: Vec<Value>,
    fetches: FetchCounter,
}

#[async_trait::async_trait]
impl ValueSource for ScriptedSource {
    async fn fetch(&self) -> Result<Value> {
        let n = self.fetches.bump();
        Ok(self.values[n % self.values.len()].clone())
    }
}

/// A source that always fails
pub struct FailingSource {
    message: String,
    fetches: FetchCounter,
}

#[async_trait::async_trait]
impl ValueSource for FailingSource {
    async fn fetch(&self) -> Result<Value> {
        self.fetches.bump();
        Err(Error::fetch(self.message.clone()))
    }
}

/// A source that takes `delay` to answer, counting started and finished fetches
pub struct SlowSource {
    delay: Duration,
    started: FetchCounter,
    finished: FetchCounter,
}

#[async_trait::async_trait]
impl ValueSource for SlowSource {
    async fn fetch(&self) -> Result<Value> {
        self.started.bump();
        tokio::time::sleep(self.delay).await;
        let n = self.finished.bump();
        Ok(Value::from(n))
    }
}

/// Register type `name` answering after `delay`; returns (started, finished)
pub fn register_slow(plugins: &Plugins, name: &str, delay: Duration) -> (FetchCounter, FetchCounter) {
    let started = FetchCounter::default();
    let finished = FetchCounter::default();
    let (s, f) = (started.clone(), finished.clone());
    plugins.values.register(name, move |_settings| {
        Ok(Box::new(SlowSource {
            delay,
            started: s.clone(),
            finished: f.clone(),
        }) as Box<dyn ValueSource>)
    });
    (started, finished)
}

/// Register type `name` returning `values` in turn, round robin
pub fn register_scripted(plugins: &Plugins, name: &str, values: Vec<Value>) -> FetchCounter {
    assert!(!values.is_empty(), "scripted source needs at least one value");
    let fetches = FetchCounter::default();
    let shared = fetches.clone();
    plugins.values.register(name, move |_settings| {
        Ok(Box::new(ScriptedSource {
            values: values.clone(),
            fetches: shared.clone(),
        }) as Box<dyn ValueSource>)
    });
    fetches
}

/// Register type `name` always returning `value`
pub fn register_fixed(plugins: &Plugins, name: &str, value: Value) -> FetchCounter {
    register_scripted(plugins, name, vec![value])
}

/// Register type `name` failing every fetch with `message`
pub fn register_failing(plugins: &Plugins, name: &str, message: &str) -> FetchCounter {
    let fetches = FetchCounter::default();
    let shared = fetches.clone();
    let message = message.to_string();
    plugins.values.register(name, move |_settings| {
        Ok(Box::new(FailingSource {
            message: message.clone(),
            fetches: shared.clone(),
        }) as Box<dyn ValueSource>)
    });
    fetches
}

/// Configuration with one property per `(key, type)` pair, in order
pub fn config_of(properties: &[(&str, &str)]) -> FrameConfig {
    properties
        .iter()
        .fold(FrameConfig::new("contract"), |config, (key, type_name)| {
            config.with_property(*key, PropertyConfig::new(Settings::of_type(*type_name)))
        })
}

/// A callback that records every value it is called with
pub fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = move |value: &Value| sink.lock().unwrap().push(value.clone());
    (seen, callback)
}

/// Values recorded so far
pub fn recorded(seen: &Arc<Mutex<Vec<Value>>>) -> Vec<Value> {
    seen.lock().unwrap().clone()
}

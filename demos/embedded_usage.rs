//! Minimal embedding example for frame-core
//!
//! Registers a custom value source next to the bundled plugins, builds an
//! engine from an in-code configuration and prints the rendered update
//! stream for a few seconds. The application owns the engine lifecycle.

use frame_core::{FrameConfig, FrameEngine, Plugins, PropertyConfig, Result, Settings, ValueSource};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::info;

/// Counts up by `step` on every fetch
struct Counter {
    next: AtomicU64,
    step: u64,
}

impl Counter {
    fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            next: AtomicU64::new(settings.get_u64("start").unwrap_or(0)),
            step: settings.get_u64("step").unwrap_or(1),
        })
    }
}

#[async_trait::async_trait]
impl ValueSource for Counter {
    async fn fetch(&self) -> Result<Value> {
        Ok(json!(self.next.fetch_add(self.step, Ordering::SeqCst)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let plugins = Plugins::new();
    frame_plugins::register(&plugins);
    plugins.values.register("counter", |settings| {
        Ok(Box::new(Counter::from_settings(settings)?) as Box<dyn ValueSource>)
    });

    let config = FrameConfig::new("Embedded")
        .with_property(
            "ticks",
            PropertyConfig::new(Settings::of_type("counter").with("step", 5))
                .with_name("Ticks")
                .with_poll(1.0),
        )
        .with_property(
            "kernel",
            PropertyConfig::new(Settings::of_type("shell").with("cmd", "uname -sr")),
        );

    let (engine, _events) = FrameEngine::new(config, Arc::new(plugins))?;
    engine.start()?;

    let mut updates = engine.update_stream();
    let deadline = tokio::time::sleep(Duration::from_secs(4));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(update) = updates.next() => {
                info!("{} = {}", update.id, update.rendered);
            }
            _ = &mut deadline => break,
        }
    }

    drop(updates);
    info!("Stopped {} pollers", engine.stop_pollers());
    Ok(())
}

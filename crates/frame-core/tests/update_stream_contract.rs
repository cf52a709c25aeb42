//! Contract Test: Update Stream
//!
//! Verifies the feed handed to transports.
//!
//! Constraints verified:
//! - The stream does no work until it is first polled
//! - The first events carry every key's current value exactly once
//! - Afterwards each event is one changed key
//! - Dropping a stream releases its subscriptions and only its own

mod common;

use common::*;
use frame_core::{FrameEngine, Plugins, RenderedUpdate, UpdateStream};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

fn update(id: &str, rendered: &str) -> RenderedUpdate {
    RenderedUpdate {
        id: id.to_string(),
        rendered: rendered.to_string(),
    }
}

async fn next(stream: &mut UpdateStream) -> RenderedUpdate {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("update within timeout")
        .expect("stream never ends")
}

#[tokio::test]
async fn first_events_carry_every_key_once() {
    let plugins = Plugins::new();
    register_fixed(&plugins, "one", json!(1));
    register_fixed(&plugins, "two", json!(2));
    let (engine, _events) =
        FrameEngine::new(config_of(&[("a", "one"), ("b", "two")]), Arc::new(plugins)).unwrap();

    let mut stream = engine.update_stream();
    let mut first = vec![next(&mut stream).await, next(&mut stream).await];
    first.sort_by(|x, y| x.id.cmp(&y.id));

    assert_eq!(first, vec![update("a", "1"), update("b", "2")]);
}

#[tokio::test]
async fn stream_is_lazy() {
    let plugins = Plugins::new();
    let fetches = register_fixed(&plugins, "one", json!(1));
    let (engine, _events) =
        FrameEngine::new(config_of(&[("a", "one")]), Arc::new(plugins)).unwrap();

    let mut stream = engine.update_stream();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fetches.get(), 0);
    assert_eq!(engine.store().triggers().subscriber_count(), 0);

    assert_eq!(next(&mut stream).await, update("a", "1"));
    assert_eq!(fetches.get(), 1);
}

#[tokio::test]
async fn stays_pending_without_changes() {
    let plugins = Plugins::new();
    register_fixed(&plugins, "one", json!(1));
    let (engine, _events) =
        FrameEngine::new(config_of(&[("a", "one")]), Arc::new(plugins)).unwrap();

    let mut stream = engine.update_stream();
    assert_eq!(next(&mut stream).await, update("a", "1"));

    let mut pending = tokio_test::task::spawn(stream.next());
    tokio_test::assert_pending!(pending.poll());
}

#[tokio::test]
async fn later_events_are_changes_in_commit_order() {
    let plugins = Plugins::new();
    register_scripted(&plugins, "counter", vec![json!(1), json!(2), json!(3)]);
    register_fixed(&plugins, "fixed", json!("same"));
    let (engine, _events) = FrameEngine::new(
        config_of(&[("a", "counter"), ("b", "fixed")]),
        Arc::new(plugins),
    )
    .unwrap();

    let mut stream = engine.update_stream();
    next(&mut stream).await;
    next(&mut stream).await;

    // "b" fetches the same value again and must not produce an event
    engine.pull(&["a", "b"]).await.unwrap();
    engine.pull(&["a"]).await.unwrap();

    assert_eq!(next(&mut stream).await, update("a", "2"));
    assert_eq!(next(&mut stream).await, update("a", "3"));
}

#[tokio::test]
async fn failed_initial_fetch_still_emits_every_key() {
    let plugins = Plugins::new();
    register_fixed(&plugins, "one", json!(1));
    register_failing(&plugins, "broken", "no such file");
    let (engine, _events) = FrameEngine::new(
        config_of(&[("a", "one"), ("b", "broken")]),
        Arc::new(plugins),
    )
    .unwrap();

    let mut stream = engine.update_stream();
    let mut first = vec![next(&mut stream).await, next(&mut stream).await];
    first.sort_by(|x, y| x.id.cmp(&y.id));

    assert_eq!(first, vec![update("a", "1"), update("b", "")]);
}

#[tokio::test]
async fn dropping_stream_releases_its_subscriptions() {
    let plugins = Plugins::new();
    register_fixed(&plugins, "one", json!(1));
    register_fixed(&plugins, "two", json!(2));
    let (engine, _events) =
        FrameEngine::new(config_of(&[("a", "one"), ("b", "two")]), Arc::new(plugins)).unwrap();

    let mut stream = engine.update_stream();
    next(&mut stream).await;
    assert_eq!(engine.store().triggers().subscriber_count(), 2);

    drop(stream);
    assert_eq!(engine.store().triggers().subscriber_count(), 0);
}

#[tokio::test]
async fn consumers_are_independent() {
    let plugins = Plugins::new();
    register_scripted(&plugins, "counter", vec![json!(1), json!(2), json!(3)]);
    let (engine, _events) =
        FrameEngine::new(config_of(&[("a", "counter")]), Arc::new(plugins)).unwrap();

    let mut first = engine.update_stream();
    assert_eq!(next(&mut first).await, update("a", "1"));

    // Opening the second stream pulls again, which the first one sees
    let mut second = engine.update_stream();
    assert_eq!(next(&mut second).await, update("a", "2"));
    assert_eq!(engine.store().triggers().subscriber_count(), 2);

    drop(second);
    assert_eq!(engine.store().triggers().subscriber_count(), 1);

    engine.pull(&["a"]).await.unwrap();
    assert_eq!(next(&mut first).await, update("a", "2"));
    assert_eq!(next(&mut first).await, update("a", "3"));
}

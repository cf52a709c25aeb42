// # frame-core
//
// Core library for live, configuration-driven dashboards.
//
// ## Architecture Overview
//
// A dashboard is a set of properties. Each property's value comes from a
// pluggable source; the engine keeps the latest values in one snapshot and
// tells interested parties when something changed:
// - **Plugins**: One type registry per plugin category (values, actions,
//   renderers, targets, parsers) with named references and defaults
// - **SnapshotStore**: Canonical state, replaced by atomic transitions
// - **TriggerSet**: Selector-based change notification
// - **FrameEngine**: Pulls and polls properties, runs actions, feeds update
//   streams
//
// ## Design Principles
//
// 1. **Plugin-Based**: Every source, renderer and action is resolved by name
// 2. **All-or-Nothing State**: Readers only ever see committed snapshots
// 3. **Change-Driven**: Subscribers hear about a value only when it changes
// 4. **Library-First**: The daemon is a thin shell around this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod settings;
pub mod state;
pub mod traits;
pub mod trigger;

// Re-export core types for convenience
pub use config::{EngineConfig, FrameConfig, PropertyConfig};
pub use engine::{EngineEvent, FrameEngine, RenderedUpdate, UpdateStream, ValueDelegate};
pub use error::{Error, FetchFailure, Result};
pub use registry::{Factory, FactoryContext, Plugins, TypeRegistry};
pub use settings::Settings;
pub use state::{Snapshot, SnapshotStore, Transaction};
pub use traits::{Action, ActionSet, Notification, NotificationTarget, Parser, Renderer, ValueSource};
pub use trigger::{Selector, Subscription, SubscriptionGroup, TriggerSet};

// # Plugins
//
// The explicit owner of every plugin registry and of the defaults table they
// share. One `Plugins` is built at startup, plugin crates register into it,
// configuration installs defaults and references, and the engine resolves
// every property and action through it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::config::FrameConfig;
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::traits::{
    Action, IdentityParser, NotificationTarget, Parser, PlainRenderer, Renderer, ValueSource,
};

use super::{FactoryContext, TypeRegistry, read, write};

/// Registry name for value sources
pub const VALUES: &str = "value";
/// Registry name for actions
pub const ACTIONS: &str = "action";
/// Registry name for renderers
pub const RENDERERS: &str = "renderer";
/// Registry name for notification targets
pub const TARGETS: &str = "target";
/// Registry name for parsers
pub const PARSERS: &str = "parser";

/// `registry name → type name → partial settings`
pub type DefaultsTable = HashMap<String, HashMap<String, Settings>>;

/// Defaults table shared between the registries of one [`Plugins`]
pub type SharedDefaults = Arc<RwLock<DefaultsTable>>;

/// All plugin registries plus the shared defaults table
pub struct Plugins {
    /// Property value sources
    pub values: TypeRegistry<dyn ValueSource>,

    /// User-triggered actions
    pub actions: TypeRegistry<dyn Action>,

    /// Value renderers
    pub renderers: TypeRegistry<dyn Renderer>,

    /// Notification targets
    pub targets: TypeRegistry<dyn NotificationTarget>,

    /// Output parsers
    pub parsers: TypeRegistry<dyn Parser>,

    defaults: SharedDefaults,
}

impl Plugins {
    /// Create registries holding only the builtin `string` renderer and parser
    pub fn new() -> Self {
        let defaults = SharedDefaults::default();
        let shared = || Arc::clone(&defaults);

        let values = TypeRegistry::with_defaults(
            VALUES,
            Settings::new().with("renderer", "string"),
            shared(),
        );
        let actions = TypeRegistry::with_defaults(ACTIONS, Settings::new(), shared());
        let renderers = TypeRegistry::with_defaults(RENDERERS, Settings::new(), shared());
        let targets = TypeRegistry::with_defaults(TARGETS, Settings::new(), shared());
        let parsers = TypeRegistry::with_defaults(PARSERS, Settings::new(), shared());

        let plugins = Self {
            values,
            actions,
            renderers,
            targets,
            parsers,
            defaults,
        };

        plugins.renderers.register("string", plain_renderer);
        plugins.parsers.register("string", identity_parser);
        plugins
    }

    /// Merge a defaults table into the shared one
    ///
    /// Settings are overlaid key by key, so plugin crates can seed defaults
    /// that configuration later extends or overrides.
    pub fn set_defaults(&self, table: &DefaultsTable) {
        let mut defaults = write(&self.defaults);
        for (registry, types) in table {
            let entry = defaults.entry(registry.clone()).or_default();
            for (type_name, settings) in types {
                entry.entry(type_name.clone()).or_default().overlay(settings);
            }
        }
    }

    /// Set a single default setting for one type
    pub fn set_default(&self, registry: &str, type_name: &str, key: &str, value: impl Into<Value>) {
        write(&self.defaults)
            .entry(registry.to_string())
            .or_default()
            .entry(type_name.to_string())
            .or_default()
            .insert(key, value);
    }

    /// Defaults currently set for one type
    pub fn defaults_for(&self, registry: &str, type_name: &str) -> Option<Settings> {
        read(&self.defaults)
            .get(registry)
            .and_then(|types| types.get(type_name))
            .cloned()
    }

    /// Register a reference in the registry named `registry`
    pub fn register_ref(&self, registry: &str, name: &str, settings: Settings) -> Result<()> {
        match registry {
            VALUES => self.values.register_ref(name, settings),
            ACTIONS => self.actions.register_ref(name, settings),
            RENDERERS => self.renderers.register_ref(name, settings),
            TARGETS => self.targets.register_ref(name, settings),
            PARSERS => self.parsers.register_ref(name, settings),
            other => Err(Error::config(format!("Unknown registry: {}", other))),
        }
    }

    /// Install the defaults and references declared in configuration
    pub fn apply_config(&self, config: &FrameConfig) -> Result<()> {
        self.set_defaults(&config.defaults);

        for (registry, references) in &config.references {
            for (name, settings) in references {
                self.register_ref(registry, name, settings.clone())?;
            }
        }

        Ok(())
    }

    /// A context exposing these registries (no snapshot store)
    pub fn context(&self) -> FactoryContext<'_> {
        FactoryContext::new(self)
    }
}

impl Default for Plugins {
    fn default() -> Self {
        Self::new()
    }
}

fn plain_renderer(settings: &Settings) -> Result<Box<dyn Renderer>> {
    Ok(Box::new(PlainRenderer::from_settings(settings)?))
}

fn identity_parser(_settings: &Settings) -> Result<Box<dyn Parser>> {
    Ok(Box::new(IdentityParser))
}

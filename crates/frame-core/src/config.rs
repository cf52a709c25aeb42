//! Configuration types for the Frame dashboard
//!
//! This module defines all configuration structures used throughout the crate.
//!
//! ## Example (YAML)
//!
//! ```yaml
//! name: Studio
//! defaults:
//!   value:
//!     shell:
//!       timeout_secs: 10
//! references:
//!   value:
//!     load:
//!       type: shell
//!       cmd: uptime
//!       parser: { type: regex, pattern: "load averages?: ([0-9.]+)", group: 1 }
//! model:
//!   cpu:
//!     name: CPU load
//!     get: load
//!     poll: 2
//! actions:
//!   restart:
//!     type: shell
//!     cmd: systemctl restart studio
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::registry::{ACTIONS, DefaultsTable, PARSERS, RENDERERS, TARGETS, VALUES};
use crate::settings::Settings;

/// Main Frame configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Project name shown as the dashboard title
    #[serde(default)]
    pub name: String,

    /// Per-registry, per-type default settings
    #[serde(default)]
    pub defaults: DefaultsTable,

    /// Per-registry named references (`ref name → settings`)
    #[serde(default)]
    pub references: HashMap<String, IndexMap<String, Settings>>,

    /// Properties, in display order
    #[serde(default)]
    pub model: IndexMap<String, PropertyConfig>,

    /// Actions, in display order
    #[serde(default)]
    pub actions: IndexMap<String, Settings>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FrameConfig {
    /// Create a new configuration with defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a property (builder style)
    pub fn with_property(mut self, key: impl Into<String>, property: PropertyConfig) -> Self {
        self.model.insert(key.into(), property);
        self
    }

    /// Add an action (builder style)
    pub fn with_action(mut self, name: impl Into<String>, settings: impl Into<Settings>) -> Self {
        self.actions.insert(name.into(), settings.into());
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Parse a JSON document
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a configuration file; `.yaml`/`.yml` are YAML, anything else JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source),
            _ => Self::from_json_str(&source),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(Error::config("No properties configured"));
        }

        for (key, property) in &self.model {
            property
                .validate()
                .map_err(|e| Error::config(format!("property '{}': {}", key, e)))?;
        }

        for registry in self.defaults.keys().chain(self.references.keys()) {
            if !is_registry_name(registry) {
                return Err(Error::config(format!("Unknown registry: {}", registry)));
            }
        }

        self.engine.validate()?;

        Ok(())
    }
}

fn is_registry_name(name: &str) -> bool {
    [VALUES, ACTIONS, RENDERERS, TARGETS, PARSERS].contains(&name)
}

/// One dashboard property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    /// Display name (the key when absent)
    #[serde(default)]
    pub name: Option<String>,

    /// Value source settings
    pub get: Settings,

    /// Poll interval in seconds
    #[serde(default)]
    pub poll: Option<f64>,

    /// Renderer settings (falls back to the resolved `renderer` setting)
    #[serde(default)]
    pub renderer: Option<Settings>,
}

impl PropertyConfig {
    /// Create a property fetched by `get`
    pub fn new(get: impl Into<Settings>) -> Self {
        Self {
            name: None,
            get: get.into(),
            poll: None,
            renderer: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the poll interval in seconds
    pub fn with_poll(mut self, seconds: f64) -> Self {
        self.poll = Some(seconds);
        self
    }

    /// Set the renderer
    pub fn with_renderer(mut self, renderer: impl Into<Settings>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    /// Validate the property configuration
    pub fn validate(&self) -> Result<()> {
        self.get.type_name()?;

        if let Some(poll) = self.poll {
            validate_poll(poll)?;
        }

        if let Some(renderer) = &self.renderer {
            renderer.type_name()?;
        }

        Ok(())
    }
}

/// Check a poll interval in seconds and convert it
pub fn validate_poll(seconds: f64) -> Result<Duration> {
    let invalid = || {
        Error::config(format!(
            "poll interval must be a positive number of seconds, got {}",
            seconds
        ))
    };
    if seconds <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

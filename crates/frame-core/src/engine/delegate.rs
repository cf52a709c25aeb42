// # Value Delegate
//
// The resolved runtime unit bound to one configured property: its value
// source, poll interval and renderer. Built once at configuration load.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use crate::config::{PropertyConfig, validate_poll};
use crate::error::Result;
use crate::registry::FactoryContext;
use crate::settings::Settings;
use crate::traits::{Renderer, ValueSource};

/// Fetches and renders one property
pub struct ValueDelegate {
    key: String,
    display_name: String,
    source: Box<dyn ValueSource>,
    poll: Option<Duration>,
    renderer: Box<dyn Renderer>,
    settings: Settings,
}

impl ValueDelegate {
    /// Resolve a property through the registries
    ///
    /// The poll interval comes from the property's `poll`, else from the
    /// resolved value settings (which may carry it from defaults or a
    /// reference). The renderer is the property's `renderer`, else the
    /// resolved `renderer` setting.
    pub fn build(key: &str, property: &PropertyConfig, ctx: &FactoryContext<'_>) -> Result<Self> {
        let plugins = ctx.plugins();
        let (source, settings) = plugins.values.make_with(property.get.clone(), ctx)?;

        let poll = match property.poll {
            Some(seconds) => Some(seconds),
            None => settings.get_f64("poll"),
        };
        let poll = poll.map(validate_poll).transpose()?;

        let renderer_settings = match (&property.renderer, settings.get("renderer")) {
            (Some(renderer), _) => renderer.clone(),
            (None, Some(resolved)) => Settings::from_value(resolved.clone())?,
            (None, None) => Settings::of_type("string"),
        };
        let (renderer, _) = plugins.renderers.make_with(renderer_settings, ctx)?;

        Ok(Self {
            key: key.to_string(),
            display_name: property.name.clone().unwrap_or_else(|| key.to_string()),
            source,
            poll,
            renderer,
            settings,
        })
    }

    /// Fetch the current value from the source
    pub async fn fetch(&self) -> Result<Value> {
        trace!("Fetching {}", self.key);
        self.source.fetch().await
    }

    /// Render a value of this property
    pub fn render(&self, value: &Value) -> String {
        self.renderer.render(value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll
    }

    /// Whether the UI should collapse this property by default
    pub fn folding(&self) -> bool {
        self.renderer.folding()
    }

    /// Fully merged settings of the value source
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl fmt::Debug for ValueDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueDelegate")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("poll", &self.poll)
            .finish()
    }
}

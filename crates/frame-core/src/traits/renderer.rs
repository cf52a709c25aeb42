// # Renderer Trait
//
// Turns a fetched value into its presentation string. The transport layer
// decides how that string is framed on the wire.

use serde_json::Value;

use crate::error::Result;
use crate::settings::Settings;

/// Trait for renderer implementations
pub trait Renderer: Send + Sync {
    /// Render a value for display
    fn render(&self, value: &Value) -> String;

    /// Whether the UI should show this property collapsed by default
    fn folding(&self) -> bool {
        false
    }
}

/// Plain-text renderer, registered as `string` in every [`crate::Plugins`]
///
/// Strings render without quotes, `null` renders empty, everything else
/// renders as compact JSON.
#[derive(Debug, Clone, Default)]
pub struct PlainRenderer {
    folding: bool,
}

impl PlainRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            folding: settings.get_bool("folding").unwrap_or(false),
        })
    }
}

impl Renderer for PlainRenderer {
    fn render(&self, value: &Value) -> String {
        render_plain(value)
    }

    fn folding(&self) -> bool {
        self.folding
    }
}

/// Shared plain-text rendering rule
pub fn render_plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

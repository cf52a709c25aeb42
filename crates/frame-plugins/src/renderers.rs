// # Renderers
//
// `json`, `status` and `pre`. The plain `string` renderer is built into
// frame-core. Every renderer honours a `folding` setting.

use frame_core::traits::render_plain;
use frame_core::{Renderer, Result, Settings};
use serde_json::Value;

fn folding(settings: &Settings, default: bool) -> bool {
    settings.get_bool("folding").unwrap_or(default)
}

/// Pretty-printed JSON; folded by default
pub struct JsonRenderer {
    folding: bool,
}

impl JsonRenderer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            folding: folding(settings, true),
        })
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, value: &Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    }

    fn folding(&self) -> bool {
        self.folding
    }
}

/// `Good` for truthy values, `Error` otherwise
pub struct StatusRenderer {
    folding: bool,
}

impl StatusRenderer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            folding: folding(settings, false),
        })
    }
}

impl Renderer for StatusRenderer {
    fn render(&self, value: &Value) -> String {
        if is_truthy(value) { "Good" } else { "Error" }.to_string()
    }

    fn folding(&self) -> bool {
        self.folding
    }
}

/// Empty containers, empty strings, zero, `false` and `null` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Preformatted text with trailing whitespace trimmed; folded by default
pub struct PreRenderer {
    folding: bool,
}

impl PreRenderer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            folding: folding(settings, true),
        })
    }
}

impl Renderer for PreRenderer {
    fn render(&self, value: &Value) -> String {
        render_plain(value).trim_end().to_string()
    }

    fn folding(&self) -> bool {
        self.folding
    }
}

// # Settings
//
// Ordered key/value mapping handed to plugin factories. Every settings
// mapping names its plugin through a mandatory `type` field; a bare string
// in configuration is shorthand for `{type: <string>}`.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field holding the plugin type name
pub const TYPE_FIELD: &str = "type";

/// Ordered plugin settings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    /// Create empty settings (no `type`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings naming only a type
    pub fn of_type(name: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(TYPE_FIELD.to_string(), Value::String(name.into()));
        Self(map)
    }

    /// Build settings from a JSON value: a string is a type name, an object
    /// is taken as-is.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::of_type(name)),
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::invalid_settings(format!(
                "expected a type name or a mapping, got {}",
                other
            ))),
        }
    }

    /// The `type` field
    pub fn type_name(&self) -> Result<&str> {
        match self.0.get(TYPE_FIELD) {
            Some(Value::String(name)) => Ok(name),
            Some(other) => Err(Error::invalid_settings(format!(
                "'type' must be a string, got {}",
                other
            ))),
            None => Err(Error::invalid_settings("missing 'type' field")),
        }
    }

    /// Replace the `type` field
    pub fn set_type(&mut self, name: impl Into<String>) {
        self.0
            .insert(TYPE_FIELD.to_string(), Value::String(name.into()));
    }

    /// Apply `other` on top of `self`; keys in `other` win.
    pub fn overlay(&mut self, other: &Settings) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Builder form of [`Settings::overlay`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Numeric field; numeric strings are accepted too
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// A string field that must be present
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .ok_or_else(|| Error::invalid_settings(format!("missing string field '{}'", key)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<&str> for Settings {
    fn from(name: &str) -> Self {
        Self::of_type(name)
    }
}

impl From<String> for Settings {
    fn from(name: String) -> Self {
        Self::of_type(name)
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Settings {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Map(Map<String, Value>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Settings::of_type(name),
            Repr::Map(map) => Settings(map),
        })
    }
}

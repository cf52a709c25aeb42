//! Error types for the Frame dashboard
//!
//! This module defines all error types used throughout the crate.

use std::fmt;
use thiserror::Error;

/// Result type alias for Frame operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single key that could not be refreshed during a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// The property key whose fetch failed
    pub key: String,
    /// Rendered error message from the value source
    pub message: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Core error type for the Frame dashboard
#[derive(Error, Debug)]
pub enum Error {
    /// A type or reference name is not registered in the registry
    #[error("No {registry} type registered with name: {name}")]
    UnknownType {
        /// Registry name (e.g. "value", "action")
        registry: String,
        /// The requested type name
        name: String,
    },

    /// A reference chain revisited a type name
    #[error("Circular reference in {registry} types: {}", chain.join(" -> "))]
    CircularReference {
        /// Registry name
        registry: String,
        /// Names visited, ending with the repeated one
        chain: Vec<String>,
    },

    /// Settings are malformed (missing `type`, wrong field type, ...)
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A contextual factory was invoked without an engine context
    #[error("Type '{0}' requires an engine context to be constructed")]
    MissingContext(String),

    /// A value source failed to fetch
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// One or more keys of a pull failed; successful keys were committed
    #[error("{} of the pulled keys failed: {}", failures.len(), join_failures(failures))]
    PullFailed {
        /// Every key that failed, with its message
        failures: Vec<FetchFailure>,
    },

    /// The key is not part of the configured key set
    #[error("Unknown property: {0}")]
    UnknownKey(String),

    /// No action registered under this name
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Action execution errors
    #[error("Action error: {0}")]
    Action(String),

    /// HTTP client errors (from notification targets)
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn join_failures(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create an unknown type error
    pub fn unknown_type(registry: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownType {
            registry: registry.into(),
            name: name.into(),
        }
    }

    /// Create an invalid settings error
    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an action error
    pub fn action(msg: impl Into<String>) -> Self {
        Self::Action(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Keys that failed, if this is a pull failure
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            Self::PullFailed { failures } => failures.iter().map(|f| f.key.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

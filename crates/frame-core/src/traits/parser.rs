// # Parser Trait
//
// Converts raw fetched output (usually command stdout as a string value)
// into a structured value.

use serde_json::Value;

/// Trait for parser implementations
pub trait Parser: Send + Sync {
    /// Parse an input value
    ///
    /// Parsers are chained by the `sequence` parser, so the input is the
    /// previous parser's output rather than always a string.
    fn parse(&self, input: Value) -> Result<Value, crate::Error>;
}

/// Identity parser, registered as `string` in every [`crate::Plugins`]
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityParser;

impl Parser for IdentityParser {
    fn parse(&self, input: Value) -> Result<Value, crate::Error> {
        Ok(input)
    }
}

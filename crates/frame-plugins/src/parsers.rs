// # Parsers
//
// - `json`: parse a string as JSON (non-strings pass through)
// - `regex`: first match of `pattern`, capture `group` (default 0), null
//   when nothing matches
// - `detect`: whether `pattern` matches, flipped by `invert`
// - `sequence`: apply `parsers` in order

use frame_core::registry::FactoryContext;
use frame_core::traits::render_plain;
use frame_core::{Error, Parser, Result, Settings};
use regex::Regex;
use serde_json::Value;

pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, input: Value) -> Result<Value> {
        match input {
            Value::String(text) => Ok(serde_json::from_str(&text)?),
            other => Ok(other),
        }
    }
}

/// Which capture group a regex parser returns
#[derive(Debug, Clone)]
enum Group {
    Index(usize),
    Name(String),
}

fn compile(settings: &Settings) -> Result<Regex> {
    let pattern = settings.get_str("pattern").unwrap_or(".*");
    Regex::new(pattern)
        .map_err(|e| Error::invalid_settings(format!("bad pattern '{}': {}", pattern, e)))
}

pub struct RegexParser {
    pattern: Regex,
    group: Group,
}

impl RegexParser {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let group = match settings.get("group") {
            None => Group::Index(0),
            Some(Value::String(name)) => match name.parse() {
                Ok(index) => Group::Index(index),
                Err(_) => Group::Name(name.clone()),
            },
            Some(other) => Group::Index(other.as_u64().ok_or_else(|| {
                Error::invalid_settings(format!("'group' must be an index or a name, got {}", other))
            })? as usize),
        };

        Ok(Self {
            pattern: compile(settings)?,
            group,
        })
    }
}

impl Parser for RegexParser {
    fn parse(&self, input: Value) -> Result<Value> {
        let text = render_plain(&input);
        let Some(captures) = self.pattern.captures(&text) else {
            return Ok(Value::Null);
        };

        let matched = match &self.group {
            Group::Index(index) => captures.get(*index),
            Group::Name(name) => captures.name(name),
        };
        Ok(matched.map_or(Value::Null, |m| Value::String(m.as_str().to_string())))
    }
}

pub struct DetectParser {
    pattern: Regex,
    invert: bool,
}

impl DetectParser {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            pattern: compile(settings)?,
            invert: settings.get_bool("invert").unwrap_or(false),
        })
    }
}

impl Parser for DetectParser {
    fn parse(&self, input: Value) -> Result<Value> {
        let found = self.pattern.is_match(&render_plain(&input));
        Ok(Value::Bool(found != self.invert))
    }
}

pub struct SequenceParser {
    parsers: Vec<Box<dyn Parser>>,
}

impl SequenceParser {
    pub fn build(settings: &Settings, ctx: &FactoryContext<'_>) -> Result<Self> {
        let steps = match settings.get("parsers") {
            Some(Value::Array(steps)) => steps,
            _ => return Err(Error::invalid_settings("'parsers' must be a list")),
        };

        let parsers = steps
            .iter()
            .map(|step| {
                let step = Settings::from_value(step.clone())?;
                let (parser, _) = ctx.plugins().parsers.make_with(step, ctx)?;
                Ok(parser)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { parsers })
    }
}

impl Parser for SequenceParser {
    fn parse(&self, input: Value) -> Result<Value> {
        self.parsers
            .iter()
            .try_fold(input, |value, parser| parser.parse(value))
    }
}

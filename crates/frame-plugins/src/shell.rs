// # Shell Plugins
//
// `shell` value source and `shell` action. Both run `cmd` and hand stdout,
// as a string value, to their `parser` (default `string`).

use async_trait::async_trait;
use frame_core::registry::FactoryContext;
use frame_core::{Action, ActionSet, Parser, Result, Settings, ValueSource};
use serde_json::Value;
use std::time::Duration;

use crate::command::{CommandLine, timeout_of};

struct ShellCommand {
    command: CommandLine,
    timeout: Option<Duration>,
    parser: Box<dyn Parser>,
}

impl ShellCommand {
    fn build(settings: &Settings, ctx: &FactoryContext<'_>) -> Result<Self> {
        let parser = settings
            .get("parser")
            .cloned()
            .map(Settings::from_value)
            .transpose()?
            .unwrap_or_else(|| Settings::of_type("string"));
        let (parser, _) = ctx.plugins().parsers.make_with(parser, ctx)?;

        Ok(Self {
            command: CommandLine::from_settings(settings)?,
            timeout: timeout_of(settings),
            parser,
        })
    }

    async fn run(&self) -> Result<Value> {
        let stdout = self.command.run(self.timeout).await?;
        self.parser.parse(Value::String(stdout))
    }
}

/// Value fetched by running a command
pub struct ShellValue {
    inner: ShellCommand,
}

impl ShellValue {
    pub fn build(settings: &Settings, ctx: &FactoryContext<'_>) -> Result<Self> {
        Ok(Self {
            inner: ShellCommand::build(settings, ctx)?,
        })
    }
}

#[async_trait]
impl ValueSource for ShellValue {
    async fn fetch(&self) -> Result<Value> {
        self.inner.run().await
    }
}

/// Action running a command; returns the parsed output
pub struct ShellAction {
    inner: ShellCommand,
}

impl ShellAction {
    pub fn build(settings: &Settings, ctx: &FactoryContext<'_>) -> Result<Self> {
        Ok(Self {
            inner: ShellCommand::build(settings, ctx)?,
        })
    }
}

#[async_trait]
impl Action for ShellAction {
    async fn call(&self, _params: &Value, _actions: &ActionSet) -> Result<Value> {
        self.inner.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_core::Plugins;
    use serde_json::json;

    fn plugins() -> Plugins {
        let plugins = Plugins::new();
        crate::register(&plugins);
        plugins
    }

    #[tokio::test]
    async fn test_shell_value_with_regex_parser() {
        let plugins = plugins();
        let settings = Settings::of_type("shell")
            .with("cmd", "echo 'load average: 0.42, 0.30'")
            .with("parser", json!({"type": "regex", "pattern": "load average: ([0-9.]+)", "group": 1}));

        let (value, _) = plugins.values.make_with(settings, &plugins.context()).unwrap();
        assert_eq!(value.fetch().await.unwrap(), json!("0.42"));
    }

    #[tokio::test]
    async fn test_shell_value_defaults_to_raw_output() {
        let plugins = plugins();
        let settings = Settings::of_type("shell").with("cmd", json!(["echo", "raw"]));

        let (value, resolved) = plugins.values.make_with(settings, &plugins.context()).unwrap();
        assert_eq!(value.fetch().await.unwrap(), json!("raw\n"));
        assert_eq!(resolved.get_str("renderer"), Some("string"));
    }

    #[tokio::test]
    async fn test_shell_action_returns_parsed_output() {
        let plugins = plugins();
        let settings = Settings::of_type("shell")
            .with("cmd", r#"echo '{"restarted": true}'"#)
            .with("parser", "json");

        let (action, _) = plugins.actions.make_with(settings, &plugins.context()).unwrap();
        let result = action.call(&json!({}), &ActionSet::new()).await.unwrap();
        assert_eq!(result, json!({"restarted": true}));
    }

    #[test]
    fn test_shell_needs_context() {
        let plugins = plugins();
        assert!(plugins.values.make(Settings::of_type("shell").with("cmd", "true")).is_err());
    }
}

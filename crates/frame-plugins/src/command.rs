// # Command Lines
//
// A `cmd` setting is either a string run through `sh -c` or an argv list
// executed directly. A non-zero exit is an error carrying stderr.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use frame_core::{Error, Result, Settings};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// Parsed `cmd` setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Run through the shell
    Shell(String),
    /// Program plus arguments, no shell involved
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        match settings.get("cmd") {
            Some(Value::String(line)) if !line.trim().is_empty() => Ok(Self::Shell(line.clone())),
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::invalid_settings(format!("'cmd' arguments must be strings, got {}", item))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Argv),
            Some(other) => Err(Error::invalid_settings(format!(
                "'cmd' must be a non-empty string or list, got {}",
                other
            ))),
            None => Err(Error::invalid_settings("missing 'cmd'")),
        }
    }

    /// Run to completion and return stdout
    ///
    /// With a `timeout` the child is killed once the limit passes.
    pub async fn run(&self, timeout: Option<Duration>) -> Result<String> {
        let mut command = match self {
            Self::Shell(line) => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(line);
                command
            }
            Self::Argv(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| Error::invalid_settings("empty 'cmd' list"))?;
                let mut command = Command::new(program);
                command.args(args);
                command
            }
        };
        command.stdin(Stdio::null()).kill_on_drop(true);

        debug!("Running {}", self);
        let output = command.output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| Error::fetch(format!("'{}' timed out after {:?}", self, limit)))??,
            None => output.await?,
        };

        if !output.status.success() {
            return Err(Error::fetch(format!(
                "'{}' failed ({}): {}",
                self,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(line) => f.write_str(line),
            Self::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// `timeout_secs` setting, when positive
pub(crate) fn timeout_of(settings: &Settings) -> Option<Duration> {
    settings
        .get_f64("timeout_secs")
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

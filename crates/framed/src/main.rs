// # framed - Frame dashboard daemon
//
// Thin integration layer: it reads its settings from the environment, loads
// the dashboard configuration file, registers the bundled plugins and runs
// the engine until SIGTERM or SIGINT. All dashboard behaviour lives in
// frame-core and the plugin crates.
//
// ## Configuration
//
// - `FRAME_CONFIG`: path to the dashboard configuration (`.yaml`/`.yml` or JSON)
// - `FRAME_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
// - `FRAME_EVENT_CAPACITY`: overrides `engine.event_channel_capacity`
//
// ## Example
//
// ```bash
// export FRAME_CONFIG=/etc/frame/studio.yaml
// export FRAME_LOG_LEVEL=debug
//
// framed
// ```

use anyhow::{Context, Result};
use frame_core::{EngineEvent, FrameConfig, FrameEngine, Plugins};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum FrameExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FrameExitCode> for ExitCode {
    fn from(code: FrameExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon settings read from the environment
struct DaemonConfig {
    config_path: PathBuf,
    log_level: String,
    event_capacity: Option<usize>,
}

impl DaemonConfig {
    fn from_env() -> Result<Self> {
        let config_path = env::var("FRAME_CONFIG").context(
            "FRAME_CONFIG is required. Set it via: export FRAME_CONFIG=/etc/frame/studio.yaml",
        )?;

        let event_capacity = match env::var("FRAME_EVENT_CAPACITY") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("FRAME_EVENT_CAPACITY is not a number: {}", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            config_path: PathBuf::from(config_path),
            log_level: env::var("FRAME_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_capacity,
        })
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "FRAME_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Load and validate the dashboard configuration
    fn load(&self) -> Result<FrameConfig> {
        let mut config = FrameConfig::load(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;

        if let Some(capacity) = self.event_capacity {
            config.engine.event_channel_capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let daemon = match DaemonConfig::from_env() {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FrameExitCode::ConfigError.into();
        }
    };

    let log_level = match daemon.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FrameExitCode::ConfigError.into();
        }
    };

    let config = match daemon.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return FrameExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FrameExitCode::ConfigError.into();
    }

    info!("Starting framed for '{}'", config.name);
    info!(
        "Configuration loaded: {} properties, {} actions",
        config.model.len(),
        config.actions.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FrameExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => FrameExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                FrameExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                FrameExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Failure while building the engine or while running it
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

fn register_plugins() -> Arc<Plugins> {
    let plugins = Plugins::new();

    info!("Registering bundled plugins");
    frame_plugins::register(&plugins);

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP notification targets");
        frame_notify_http::register(&plugins);
    }

    Arc::new(plugins)
}

async fn run_daemon(config: FrameConfig) -> std::result::Result<(), DaemonError> {
    let plugins = register_plugins();

    let (engine, events) = FrameEngine::new(config, plugins)
        .map_err(|e| DaemonError::Startup(e.into()))?;

    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal error: {:#}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine
        .run_with_shutdown(Some(shutdown_rx))
        .await
        .map_err(|e| DaemonError::Runtime(e.into()))?;

    info!("Daemon stopped");
    Ok(())
}

/// Forward engine events to the log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::FetchFailed { key, error } => {
                warn!("Fetch failed for '{}': {}", key, error)
            }
            EngineEvent::ActionFailed { name, error } => {
                warn!("Action '{}' failed: {}", name, error)
            }
            EngineEvent::Started {
                properties,
                pollers,
            } => info!("Engine started: {} properties, {} pollers", properties, pollers),
            EngineEvent::Stopped { reason } => info!("Engine stopped: {}", reason),
            other => tracing::debug!("Engine event: {:?}", other),
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

//! Console logging for the alert services.
//!
//! A reloadable [`LevelFilter`] sits on the registry so the level read from the
//! configuration can be applied once the file is loaded. `RUST_LOG`, when set,
//! takes over: the level filter is opened to `TRACE` and left there, so the
//! [`EnvFilter`] alone decides what is printed.

use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::LevelFilter,
    fmt,
    layer::SubscriberExt,
    reload,
    util::{SubscriberInitExt, TryInitError},
};

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Unknown log level '{0}'")]
    UnknownLevel(String),
    #[error("Cannot install log subscriber: {0}")]
    Init(#[from] TryInitError),
    #[error("Cannot change log level: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle on the installed subscriber's level filter.
#[derive(Clone)]
pub struct LogHandle {
    reload_handle: reload::Handle<LevelFilter, Registry>,
    env_override: bool,
}

impl LogHandle {
    /// Applies `level`, unless `RUST_LOG` was set at startup.
    ///
    /// The level is validated either way.
    pub fn set_level(&self, level: &str) -> Result<(), LogError> {
        let filter = parse_level(level)?;
        if self.env_override {
            debug!(%filter, "{} is set, keeping its filter", EnvFilter::DEFAULT_ENV);
            return Ok(());
        }
        self.reload_handle.reload(filter)?;
        debug!(%filter, "Log level changed");
        Ok(())
    }
}

/// Installs the global subscriber at `level`.
pub fn init_logging(level: &str) -> Result<LogHandle, LogError> {
    let initial = parse_level(level)?;

    let env_filter = env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok());
    let env_override = env_filter.is_some();

    let (level_filter, reload_handle) = reload::Layer::new(if env_override {
        LevelFilter::TRACE
    } else {
        initial
    });

    tracing_subscriber::registry()
        .with(level_filter)
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .try_init()?;

    Ok(LogHandle {
        reload_handle,
        env_override,
    })
}

/// `TRACE`, `debug`, `Warning`, `off`... Python-style names are accepted too.
pub fn parse_level(level: &str) -> Result<LevelFilter, LogError> {
    let normalized = match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    };
    LevelFilter::from_str(&normalized).map_err(|_| LogError::UnknownLevel(level.to_string()))
}

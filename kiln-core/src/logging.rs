//! Tracing subscriber setup and runtime log-level control.
//!
//! The data and HTTP crates only emit `tracing` events. Installing the
//! subscriber, and changing its level while the process runs, is the job of
//! the host application through [`init_tracing`] and [`LogLevelHandle`].

use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{ConfigError, ConfigProperties, KilnConfig};
use crate::error::OperationError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// `log.*` configuration section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `info,kiln_data=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ConfigProperties for LogConfig {
    fn prefix() -> &'static str {
        "log"
    }

    fn from_config(config: &KilnConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let format = match config
            .get_or("log.format", "pretty".to_string())?
            .to_lowercase()
            .as_str()
        {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    key: "log.format".into(),
                    reason: format!("unknown format '{other}' (expected pretty or json)"),
                })
            }
        };
        Ok(Self {
            level: config.get_or("log.level", defaults.level)?,
            format,
        })
    }
}

/// Handle to the installed filter, used to switch the level at runtime.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    pub(crate) fn new(inner: reload::Handle<EnvFilter, Registry>) -> Self {
        Self { inner }
    }

    /// Replace the active filter with a single level (`trace` .. `error`).
    pub fn set_level(&self, level: &str) -> Result<(), OperationError> {
        let parsed = LevelFilter::from_str(level)
            .map_err(|_| OperationError::invalid_request("Invalid log level"))?;
        self.inner
            .reload(EnvFilter::default().add_directive(parsed.into()))
            .map_err(|e| OperationError::invalid_request(format!("Failed to set log level: {e}")))?;
        tracing::info!(level = %parsed, "log level changed");
        Ok(())
    }

    /// The active filter rendered as a directive string.
    pub fn current(&self) -> Option<String> {
        self.inner.with_current(|filter| filter.to_string()).ok()
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<LogLevelHandle, TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (filter, handle) = reload::Layer::new(filter);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true);
            Registry::default().with(filter).with(fmt_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
            Registry::default().with(filter).with(fmt_layer).try_init()?;
        }
    }

    Ok(LogLevelHandle::new(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_when_section_missing() {
        let config = KilnConfig::empty();
        assert_eq!(LogConfig::from_config(&config).unwrap(), LogConfig::default());
    }

    #[test]
    fn json_format_from_config() {
        let mut config = KilnConfig::empty();
        config.set("log.format", ConfigValue::String("JSON".into()));
        config.set("log.level", ConfigValue::String("debug".into()));
        let log = LogConfig::from_config(&config).unwrap();
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.level, "debug");
    }

    #[test]
    fn unknown_format_rejected() {
        let mut config = KilnConfig::empty();
        config.set("log.format", ConfigValue::String("xml".into()));
        assert!(matches!(
            LogConfig::from_config(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn set_level_reloads_filter() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let handle = LogLevelHandle::new(handle);

        handle.set_level("debug").unwrap();
        assert!(handle.current().unwrap().contains("debug"));

        let err = handle.set_level("verbose").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        drop(layer);
    }
}

use std::time::Duration;

use http::StatusCode;
use kiln_core::{ConfigError, ConfigProperties, KilnConfig};

/// `outbound.*` configuration section.
///
/// ```yaml
/// outbound:
///   retries: 5
///   backoff: 1000   # ms, multiplied by the attempt number
///   timeout: 30000  # ms, per attempt
///   success: 200
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerConfig {
    /// Retries after the first attempt; a call makes at most `max_retries + 1` attempts.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Client timeout of a single attempt. Does not bound the retry loop.
    pub attempt_timeout: Duration,
    /// The one status treated as success.
    pub success_status: StatusCode,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
            success_status: StatusCode::OK,
        }
    }
}

impl ConfigProperties for CallerConfig {
    fn prefix() -> &'static str {
        "outbound"
    }

    fn from_config(config: &KilnConfig) -> Result<Self, ConfigError> {
        let d = Self::default();
        let success: u16 = config.get_or("outbound.success", d.success_status.as_u16())?;
        let success_status = StatusCode::from_u16(success).map_err(|_| ConfigError::Invalid {
            key: "outbound.success".into(),
            reason: format!("{success} is not a valid HTTP status"),
        })?;

        Ok(Self {
            max_retries: config.get_or("outbound.retries", d.max_retries)?,
            initial_backoff: config.get_or("outbound.backoff", d.initial_backoff)?,
            attempt_timeout: config.get_or("outbound.timeout", d.attempt_timeout)?,
            success_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CallerConfig::from_config(&KilnConfig::empty()).unwrap();
        assert_eq!(config, CallerConfig::default());
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_backoff, Duration::from_millis(1000));
        assert_eq!(config.attempt_timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn reads_section() {
        let yaml = "outbound:\n  retries: 2\n  backoff: 250\n  success: 204\n";
        let config: CallerConfig = KilnConfig::from_yaml_str(yaml, "test")
            .unwrap()
            .section()
            .unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.initial_backoff, Duration::from_millis(250));
        assert_eq!(config.success_status, StatusCode::NO_CONTENT);
    }

    #[test]
    fn invalid_success_status() {
        let config = KilnConfig::from_yaml_str("outbound:\n  success: 42\n", "test").unwrap();
        let err = CallerConfig::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("outbound.success"));
    }
}

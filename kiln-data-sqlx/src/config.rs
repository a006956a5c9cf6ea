//! `database.*` configuration section.

use std::time::Duration;

use kiln_core::{ConfigError, ConfigProperties, KilnConfig};
use kiln_data::DataError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::error::SqlxErrorExt;

/// Connection settings for [`PgProvider`](crate::PgProvider).
///
/// Either a full `database.url` or the individual `host`/`port`/`user`/...
/// keys. When `url` is set the individual keys are ignored.
///
/// ```yaml
/// database:
///   host: db.internal
///   name: accounts
///   sslmode: require
///   pool:
///     max: 20
///     lifetime: 900   # seconds
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub sslmode: String,
    pub pool: PoolConfig,
}

/// `database.pool.*`: sizing and recycling of pooled connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            name: "kiln_dev".into(),
            sslmode: "disable".into(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl ConfigProperties for DatabaseConfig {
    fn prefix() -> &'static str {
        "database"
    }

    fn from_config(config: &KilnConfig) -> Result<Self, ConfigError> {
        let d = Self::default();
        let seconds = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            config
                .get_or(key, default.as_secs())
                .map(Duration::from_secs)
        };

        Ok(Self {
            url: config.get_or("database.url", None)?,
            host: config.get_or("database.host", d.host)?,
            port: config.get_or("database.port", d.port)?,
            user: config.get_or("database.user", d.user)?,
            password: config.get_or("database.password", d.password)?,
            name: config.get_or("database.name", d.name)?,
            sslmode: config.get_or("database.sslmode", d.sslmode)?,
            pool: PoolConfig {
                max_connections: config.get_or("database.pool.max", d.pool.max_connections)?,
                min_connections: config.get_or("database.pool.min", d.pool.min_connections)?,
                max_lifetime: seconds("database.pool.lifetime", d.pool.max_lifetime)?,
                idle_timeout: seconds("database.pool.idle", d.pool.idle_timeout)?,
                acquire_timeout: seconds("database.pool.acquire", d.pool.acquire_timeout)?,
            },
        })
    }
}

impl DatabaseConfig {
    /// Build the driver connection options.
    ///
    /// Fails on an unparseable `url` or an unknown `sslmode`.
    pub fn connect_options(&self) -> Result<PgConnectOptions, DataError> {
        if let Some(url) = &self.url {
            return url
                .parse::<PgConnectOptions>()
                .map_err(SqlxErrorExt::into_data_error);
        }

        let ssl_mode = self
            .sslmode
            .parse::<PgSslMode>()
            .map_err(|_| DataError::Other(format!("Unknown sslmode '{}'", self.sslmode)))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

impl PoolConfig {
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .max_lifetime(self.max_lifetime)
            .idle_timeout(self.idle_timeout)
            .acquire_timeout(self.acquire_timeout)
    }
}

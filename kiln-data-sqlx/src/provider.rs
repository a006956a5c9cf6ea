use kiln_core::{ConfigError, KilnConfig};
use kiln_data::{ConnectionHandle, ConnectionProvider, DataError, SqlValue};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Connection;
use tracing::{debug, info};

use crate::bind::{bind_all, decode_scalar};
use crate::config::DatabaseConfig;
use crate::error::SqlxErrorExt;
use crate::tx::PgTx;

/// Opens a [`PgPool`] from a [`DatabaseConfig`] each time the executor needs
/// a fresh handle.
#[derive(Debug, Clone)]
pub struct PgProvider {
    config: DatabaseConfig,
}

impl PgProvider {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Build a provider from the `database.*` section.
    pub fn from_config(config: &KilnConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.section()?))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

impl ConnectionProvider for PgProvider {
    type Handle = PgHandle;

    async fn connect(&self) -> Result<PgHandle, DataError> {
        let options = self.config.connect_options()?;
        info!(
            host = options.get_host(),
            port = options.get_port(),
            database = ?options.get_database(),
            "Connecting to database"
        );

        let pool = self
            .config
            .pool
            .pool_options()
            .connect_with(options)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        let handle = PgHandle::new(pool);
        handle.ping().await?;
        Ok(handle)
    }
}

/// A shared Postgres pool. Cloning the inner pool is cheap; the executor
/// shares the handle itself behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PgHandle {
    pool: PgPool,
}

impl PgHandle {
    /// Wrap a pool opened elsewhere.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Every connection the pool may open is open and checked out.
    fn saturated(&self) -> bool {
        self.pool.num_idle() == 0 && self.pool.size() >= self.pool.options().get_max_connections()
    }
}

impl ConnectionHandle for PgHandle {
    type Row = PgRow;
    type Tx = PgTx;

    async fn ping(&self) -> Result<(), DataError> {
        if self.pool.is_closed() {
            return Err(DataError::Other("Pool is closed".into()));
        }
        // A saturated pool is in use, not broken: report it without waiting
        // out the acquire timeout.
        let mut conn = match self.pool.try_acquire() {
            Some(conn) => conn,
            None if self.saturated() => {
                debug!(size = self.pool.size(), "All pooled connections are in use");
                return Err(DataError::Busy("All pooled connections are in use".into()));
            }
            None => self
                .pool
                .acquire()
                .await
                .map_err(SqlxErrorExt::into_data_error)?,
        };
        conn.ping().await.map_err(SqlxErrorExt::into_data_error)
    }

    async fn begin(&self) -> Result<PgTx, DataError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(PgTx::new(tx))
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<PgRow>, DataError> {
        bind_all(sql, args)
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn query_one(&self, sql: &str, args: &[SqlValue]) -> Result<Option<PgRow>, DataError> {
        bind_all(sql, args)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn query_scalar(&self, sql: &str, args: &[SqlValue]) -> Result<SqlValue, DataError> {
        let row = self
            .query_one(sql, args)
            .await?
            .ok_or_else(|| DataError::NotFound("Statement returned no row".into()))?;
        decode_scalar(&row)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

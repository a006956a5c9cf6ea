//! Transactional CRUD executor with connection self-healing.
//!
//! Repositories hand the executor a SQL string, an object-kind label used in
//! log lines and error messages, a [`RowMapper`] for reads, and the bound
//! arguments. The executor owns the transaction lifecycle and the health of the
//! shared connection handle, and turns every driver failure into an
//! [`OperationError`].
//!
//! # Example
//!
//! ```ignore
//! let executor = TransactionalExecutor::new(PgProvider::new(db_config));
//!
//! let id: i64 = executor
//!     .create(INSERT_USER, "user", &sql_args![email, display_name])
//!     .await?;
//!
//! executor.update(UPDATE_PASSWORD, "user", &sql_args![email, hash]).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kiln_core::{ConfigError, ConfigProperties, ErrorKind, KilnConfig, OperationError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::health::HealthStatus;
use crate::mapper::RowMapper;
use crate::pagination::Pagination;
use crate::provider::{ConnectionHandle, ConnectionProvider, TransactionHandle};
use crate::value::{FromSqlValue, SqlValue};

type HandleOf<P> = <P as ConnectionProvider>::Handle;
type RowOf<P> = <HandleOf<P> as ConnectionHandle>::Row;
type TxOf<P> = <HandleOf<P> as ConnectionHandle>::Tx;

/// `executor.*` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Upper bound for a whole operation (health check included). `None`
    /// leaves cancellation entirely to the caller.
    pub operation_timeout: Option<Duration>,
}

impl ConfigProperties for ExecutorOptions {
    fn prefix() -> &'static str {
        "executor"
    }

    fn from_config(config: &KilnConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            operation_timeout: config.get_or("executor.timeout", None)?,
        })
    }
}

/// Runs CRUD operations over a [`ConnectionProvider`].
///
/// The connection handle is the only shared mutable state. It is checked (and
/// replaced when missing or stale) under a single async mutex before every
/// operation, so concurrent callers hitting a dead connection wait for one
/// reconnect instead of each opening their own. Past that gate every operation
/// runs on its own transaction.
pub struct TransactionalExecutor<P: ConnectionProvider> {
    provider: P,
    handle: Mutex<Option<Arc<P::Handle>>>,
    options: ExecutorOptions,
}

impl<P: ConnectionProvider> TransactionalExecutor<P> {
    /// Create an executor; the first operation opens the connection.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            handle: Mutex::new(None),
            options: ExecutorOptions::default(),
        }
    }

    /// Create an executor around an already opened handle.
    pub fn with_handle(provider: P, handle: P::Handle) -> Self {
        Self {
            provider,
            handle: Mutex::new(Some(Arc::new(handle))),
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Return a usable handle, acquiring or replacing it if needed.
    ///
    /// The check and the replacement happen under one lock: at most one reset
    /// runs at a time and callers queued behind it see the fresh handle. A
    /// handle whose ping reports [`DataError::Busy`](crate::DataError::Busy) is
    /// kept.
    pub async fn ensure_healthy(&self) -> Result<Arc<P::Handle>, OperationError> {
        let mut slot = self.handle.lock().await;

        let stale = match slot.as_ref() {
            Some(handle) => match handle.ping().await {
                Ok(()) => return Ok(Arc::clone(handle)),
                Err(e) if e.is_busy() => {
                    debug!(error = %e, "DB connection is busy, keeping it");
                    return Ok(Arc::clone(handle));
                }
                Err(e) => {
                    warn!(error = %e, "DB connection is stale, resetting it");
                    true
                }
            },
            None => {
                warn!("DB connection is missing, opening it");
                false
            }
        };
        if stale {
            if let Some(old) = slot.take() {
                old.close().await;
            }
        }

        let handle = self.provider.connect().await.map_err(|e| {
            error!(error = %e, "Unable to connect to database");
            OperationError::new(
                ErrorKind::ConnectionUnavailable,
                "Database connection unavailable",
            )
        })?;
        let handle = Arc::new(handle);
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Probe the connection through the same gate as the operations.
    pub async fn health(&self) -> HealthStatus {
        match self.ensure_healthy().await {
            Ok(_) => HealthStatus::Up,
            Err(e) => HealthStatus::Down(e.message().to_string()),
        }
    }

    /// Close and forget the current handle.
    pub async fn close(&self) {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.take() {
            handle.close().await;
        }
    }

    pub async fn begin_transaction(&self) -> Result<TxOf<P>, OperationError> {
        let handle = self.ensure_healthy().await?;
        handle.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            OperationError::begin_failed()
        })
    }

    pub async fn commit_transaction(
        &self,
        tx: &mut TxOf<P>,
        kind: &str,
    ) -> Result<(), OperationError> {
        tx.commit().await.map_err(|e| {
            error!(kind, error = %e, "Failed to commit transaction");
            OperationError::new(
                ErrorKind::CommitFailed,
                format!("Failed to commit transaction for {kind}"),
            )
        })
    }

    /// Roll back and log any failure.
    ///
    /// Callers unwinding from another failure ignore the result: the first
    /// failure is what gets reported.
    pub async fn rollback_transaction(
        &self,
        mut tx: TxOf<P>,
        kind: &str,
    ) -> Result<(), OperationError> {
        tx.rollback().await.map_err(|e| {
            error!(kind, error = %e, "Failed to rollback transaction");
            OperationError::new(
                ErrorKind::RollbackFailed,
                format!("Failed to roll back transaction for {kind}"),
            )
        })
    }

    /// Commit, attempting a rollback if the commit fails.
    async fn finish(&self, mut tx: TxOf<P>, kind: &str) -> Result<(), OperationError> {
        if let Err(err) = self.commit_transaction(&mut tx, kind).await {
            let _ = self.rollback_transaction(tx, kind).await;
            return Err(err);
        }
        Ok(())
    }

    /// Insert a row and return the generated identifier.
    ///
    /// `query` must yield one scalar column, e.g. `... RETURNING "id"`. When the
    /// commit fails the insert may or may not be persisted; the error says so
    /// and no identifier is returned.
    pub async fn create<Id: FromSqlValue>(
        &self,
        query: &str,
        kind: &str,
        args: &[SqlValue],
    ) -> Result<Id, OperationError> {
        self.bounded(async {
            debug!(kind, "Creating object in database");
            let mut tx = self.begin_transaction().await?;

            let scalar = match tx.query_scalar(query, args).await {
                Ok(scalar) => scalar,
                Err(e) => {
                    error!(kind, error = %e, "Failed to create object, rolling back");
                    let _ = self.rollback_transaction(tx, kind).await;
                    return Err(OperationError::new(
                        ErrorKind::StatementFailed,
                        format!("Failed to create {kind}"),
                    ));
                }
            };
            let id = match Id::from_sql_value(scalar) {
                Ok(id) => id,
                Err(e) => {
                    error!(kind, error = %e, "Generated identifier has an unexpected type");
                    let _ = self.rollback_transaction(tx, kind).await;
                    return Err(OperationError::scan_failed());
                }
            };

            self.finish(tx, kind).await.map_err(|_| {
                let message = format!(
                    "Failed to commit transaction for {}; create outcome is indeterminate",
                    kind
                );
                OperationError::new(ErrorKind::CommitFailed, message)
            })?;
            Ok(id)
        })
        .await
    }

    /// Update rows. Touching zero rows is `NotFound` and nothing is committed.
    pub async fn update(
        &self,
        query: &str,
        kind: &str,
        args: &[SqlValue],
    ) -> Result<(), OperationError> {
        self.bounded(async {
            debug!(kind, "Updating object in database");
            let mut tx = self.begin_transaction().await?;

            let affected = match tx.exec(query, args).await {
                Ok(n) => n,
                Err(e) => {
                    error!(kind, error = %e, "Failed to update object, rolling back");
                    let _ = self.rollback_transaction(tx, kind).await;
                    return Err(OperationError::new(
                        ErrorKind::StatementFailed,
                        format!("Failed to update {kind}"),
                    ));
                }
            };

            if affected == 0 {
                warn!(kind, "No object found with the given criteria to update");
                let _ = self.rollback_transaction(tx, kind).await;
                return Err(OperationError::not_found(format!(
                    "No {kind} found with the given criteria to update"
                )));
            }
            info!(kind, affected, "Rows affected by update");
            self.finish(tx, kind).await
        })
        .await
    }

    /// Delete rows. Deleting nothing is a successful no-op.
    pub async fn delete(
        &self,
        query: &str,
        kind: &str,
        args: &[SqlValue],
    ) -> Result<(), OperationError> {
        self.bounded(async {
            debug!(kind, "Deleting object in database");
            let mut tx = self.begin_transaction().await?;

            let affected = match tx.exec(query, args).await {
                Ok(n) => n,
                Err(e) => {
                    error!(kind, error = %e, "Failed to delete object, rolling back");
                    let _ = self.rollback_transaction(tx, kind).await;
                    return Err(OperationError::new(
                        ErrorKind::StatementFailed,
                        format!("Failed to delete {kind}"),
                    ));
                }
            };

            info!(kind, affected, "Rows affected by delete");
            if affected == 0 {
                warn!(kind, "No object found with the given criteria to delete");
                let _ = self.rollback_transaction(tx, kind).await;
                return Ok(());
            }
            self.finish(tx, kind).await
        })
        .await
    }

    /// Read every matching row through `mapper`, preserving order.
    pub async fn get<T, M>(
        &self,
        query: &str,
        kind: &str,
        mapper: M,
        args: &[SqlValue],
    ) -> Result<Vec<T>, OperationError>
    where
        M: RowMapper<RowOf<P>, T>,
    {
        self.bounded(async {
            let handle = self.ensure_healthy().await?;
            self.fetch_all(&handle, query, kind, &mapper, args).await
        })
        .await
    }

    /// Read exactly one row. No match is `NotFound`; any other failure is
    /// `ScanFailed`.
    pub async fn get_one<T, M>(
        &self,
        query: &str,
        kind: &str,
        mapper: M,
        args: &[SqlValue],
    ) -> Result<T, OperationError>
    where
        M: RowMapper<RowOf<P>, T>,
    {
        self.bounded(async {
            let handle = self.ensure_healthy().await?;
            let not_found =
                || OperationError::not_found(format!("No {kind} found with the given criteria"));

            let row = match handle.query_one(query, args).await {
                Ok(Some(row)) => row,
                Ok(None) => {
                    debug!(kind, query, "Query returned no rows");
                    return Err(not_found());
                }
                Err(e) if e.is_not_found() => return Err(not_found()),
                Err(e) => {
                    debug!(kind, query, "Query failed");
                    error!(kind, error = %e, "Failed to execute query or map row");
                    return Err(OperationError::scan_failed());
                }
            };

            mapper.map_row(&row).map_err(|e| {
                if e.is_not_found() {
                    return not_found();
                }
                error!(kind, error = %e, "Failed to map row");
                OperationError::scan_failed()
            })
        })
        .await
    }

    /// Run `data_query` (as [`get`](Self::get)), then `count_query` without
    /// arguments, and fill `pagination` with the rows and totals.
    ///
    /// If the count fails the mapped rows are discarded.
    pub async fn get_paginated<T, M>(
        &self,
        count_query: &str,
        kind: &str,
        data_query: &str,
        mapper: M,
        mut pagination: Pagination<T>,
        args: &[SqlValue],
    ) -> Result<Pagination<T>, OperationError>
    where
        M: RowMapper<RowOf<P>, T>,
    {
        self.bounded(async {
            let handle = self.ensure_healthy().await?;
            let rows = self.fetch_all(&handle, data_query, kind, &mapper, args).await?;

            let total_rows = handle
                .query_scalar(count_query, &[])
                .await
                .and_then(i64::from_sql_value)
                .map_err(|e| {
                    error!(kind, error = %e, "Failed to count total rows");
                    OperationError::query_failed("Failed to count total rows")
                })?;

            pagination.set_totals(total_rows);
            pagination.set_rows(rows);
            Ok(pagination)
        })
        .await
    }

    async fn fetch_all<T, M>(
        &self,
        handle: &P::Handle,
        query: &str,
        kind: &str,
        mapper: &M,
        args: &[SqlValue],
    ) -> Result<Vec<T>, OperationError>
    where
        M: RowMapper<RowOf<P>, T>,
    {
        let rows = handle.query(query, args).await.map_err(|e| {
            error!(kind, error = %e, "Failed to execute query");
            OperationError::query_failed("Failed to execute query")
        })?;

        rows.iter()
            .map(|row| {
                mapper.map_row(row).map_err(|e| {
                    error!(kind, error = %e, "Failed to map row");
                    OperationError::scan_failed()
                })
            })
            .collect()
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, OperationError>>,
    ) -> Result<T, OperationError> {
        match self.options.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, operation).await.unwrap_or_else(|_| {
                error!(?limit, "Operation timed out");
                Err(OperationError::query_failed("Operation timed out"))
            }),
            None => operation.await,
        }
    }
}

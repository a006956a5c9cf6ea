//! Transaction wrapper handed to the executor.

use kiln_data::{DataError, SqlValue, TransactionHandle};
use sqlx::{Postgres, Transaction};
use tracing::debug;

use crate::bind::{bind_all, decode_scalar};
use crate::error::SqlxErrorExt;

/// A pooled Postgres transaction owned by one executor operation.
///
/// `commit` and `rollback` consume the inner transaction. A transaction whose
/// commit failed is dropped, which makes sqlx roll it back when the connection
/// returns to the pool; a rollback requested afterwards is a logged no-op. The
/// same happens for a `PgTx` dropped mid-flight (cancelled operation).
pub struct PgTx {
    inner: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { inner: Some(tx) }
    }

    /// Whether the transaction is still open.
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    fn active(&mut self) -> Result<&mut Transaction<'static, Postgres>, DataError> {
        self.inner
            .as_mut()
            .ok_or_else(|| DataError::Other("Transaction already finished".into()))
    }
}

impl TransactionHandle for PgTx {
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<u64, DataError> {
        let tx = self.active()?;
        let result = bind_all(sql, args)
            .execute(&mut **tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }

    async fn query_scalar(&mut self, sql: &str, args: &[SqlValue]) -> Result<SqlValue, DataError> {
        let tx = self.active()?;
        let row = bind_all(sql, args)
            .fetch_optional(&mut **tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?
            .ok_or_else(|| DataError::NotFound("Statement returned no row".into()))?;
        decode_scalar(&row)
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| DataError::Other("Transaction already finished".into()))?;
        tx.commit().await.map_err(SqlxErrorExt::into_data_error)
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        match self.inner.take() {
            Some(tx) => tx.rollback().await.map_err(SqlxErrorExt::into_data_error),
            None => {
                debug!("Rollback requested on a finished transaction, nothing to do");
                Ok(())
            }
        }
    }
}

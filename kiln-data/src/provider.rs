//! The contract a database backend implements for the executor.
//!
//! Uses RPITIT (return-position `impl Trait` in traits), no `async-trait`
//! needed. Implementations may write `async fn` as long as the futures are
//! `Send`.

use std::future::Future;

use crate::error::DataError;
use crate::value::SqlValue;

/// Supplies fresh connection handles (typically by opening a pool).
pub trait ConnectionProvider: Send + Sync + 'static {
    type Handle: ConnectionHandle;

    fn connect(&self) -> impl Future<Output = Result<Self::Handle, DataError>> + Send;
}

/// A pooled connection handle shared by concurrent operations.
pub trait ConnectionHandle: Send + Sync + 'static {
    type Row: Send;
    type Tx: TransactionHandle;

    /// Check that the handle can still reach the database.
    fn ping(&self) -> impl Future<Output = Result<(), DataError>> + Send;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, DataError>> + Send;

    /// Run a read and return every row, in order.
    fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> impl Future<Output = Result<Vec<Self::Row>, DataError>> + Send;

    /// Run a read expecting at most one row; `Ok(None)` when nothing matched.
    fn query_one(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> impl Future<Output = Result<Option<Self::Row>, DataError>> + Send;

    /// Run a read and decode the first column of the first row.
    ///
    /// Returns `DataError::NotFound` when the statement yields no row.
    fn query_scalar(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> impl Future<Output = Result<SqlValue, DataError>> + Send;

    /// Release the handle's resources. Called before a stale handle is replaced.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// A transaction owned by exactly one operation.
///
/// The executor finalises it once: `commit`, or `rollback`. The one exception
/// is a failed commit, after which a rollback is still attempted. A handle
/// dropped without being finalised must be rolled back by the backend.
pub trait TransactionHandle: Send {
    /// Execute a statement and return the number of affected rows.
    fn exec(
        &mut self,
        sql: &str,
        args: &[SqlValue],
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Execute a statement returning one scalar column (e.g. `RETURNING id`).
    ///
    /// Returns `DataError::NotFound` when the statement yields no row.
    fn query_scalar(
        &mut self,
        sql: &str,
        args: &[SqlValue],
    ) -> impl Future<Output = Result<SqlValue, DataError>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<(), DataError>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<(), DataError>> + Send;
}

//! # kiln-data: transactional data access
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TransactionalExecutor`] | CRUD operations, transaction lifecycle, connection self-healing |
//! | [`ConnectionProvider`] / [`ConnectionHandle`] / [`TransactionHandle`] | Contract implemented by a database backend |
//! | [`RowMapper`] | Caller-supplied row-to-value conversion |
//! | [`Pagination`] | Page/limit/sort parameters and paged results |
//! | [`SqlValue`] | Bound arguments and scalar results |
//! | [`DataError`] | Backend-level error, never returned by the executor |
//!
//! The only SQL backend shipped with Kiln is `kiln-data-sqlx` (PostgreSQL).

pub mod error;
pub mod executor;
pub mod health;
pub mod mapper;
pub mod pagination;
pub mod provider;
pub mod value;

pub use error::DataError;
pub use executor::{ExecutorOptions, TransactionalExecutor};
pub use health::HealthStatus;
pub use mapper::RowMapper;
pub use pagination::{PageRequest, Pagination};
pub use provider::{ConnectionHandle, ConnectionProvider, TransactionHandle};
pub use value::{FromSqlValue, SqlValue};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        DataError, ExecutorOptions, FromSqlValue, HealthStatus, PageRequest, Pagination,
        RowMapper, SqlValue, TransactionalExecutor,
    };
    pub use crate::sql_args;
}

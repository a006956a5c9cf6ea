//! # kiln-data-sqlx: PostgreSQL backend for the Kiln data layer
//!
//! This crate implements the [`kiln-data`] provider contract on top of
//! [SQLx](https://github.com/launchbadge/sqlx) so a `TransactionalExecutor`
//! can talk to a real PostgreSQL database.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PgProvider`] | `ConnectionProvider` opening a `PgPool` from a [`DatabaseConfig`] |
//! | [`PgHandle`] | `ConnectionHandle` over a `PgPool`; rows are `PgRow` |
//! | [`PgTx`] | `TransactionHandle` over a pooled `Transaction<'static, Postgres>` |
//! | [`DatabaseConfig`] | `database.*` configuration section, pool sizing included |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Quick start
//!
//! ```ignore
//! use kiln_data::TransactionalExecutor;
//! use kiln_data_sqlx::{PgProvider, SqlxErrorExt};
//! use sqlx::{postgres::PgRow, Row};
//!
//! let config = kiln_core::KilnConfig::load("dev")?;
//! let executor = TransactionalExecutor::new(PgProvider::from_config(&config)?);
//!
//! let emails: Vec<String> = executor
//!     .get(
//!         r#"SELECT "email" FROM "users" WHERE "active" = $1"#,
//!         "user",
//!         |row: &PgRow| row.try_get("email").map_err(SqlxErrorExt::into_data_error),
//!         &sql_args![true],
//!     )
//!     .await?;
//! ```
//!
//! # Arguments and scalars
//!
//! Arguments are bound positionally (`$1`, `$2`, ...) with the Postgres type
//! matching their `SqlValue` variant; `SqlValue::Null` lets the server infer
//! the type. Scalar results (`RETURNING "id"`, `COUNT(*)`) are decoded from
//! the first column by its Postgres type: integers, floats, booleans, text,
//! `UUID`, timestamps and `JSON`/`JSONB`.
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Mappers use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use kiln_data_sqlx::SqlxErrorExt;
//!
//! let id: i64 = row.try_get("id").map_err(|e| e.into_data_error())?;
//! ```

mod bind;
pub mod config;
pub mod error;
pub mod provider;
pub mod tx;

pub use config::{DatabaseConfig, PoolConfig};
pub use error::{SqlxErrorExt, SqlxResult};
pub use provider::{PgHandle, PgProvider};
pub use tx::PgTx;

/// Re-exports of the most commonly used types from both `kiln-data` and this crate.
pub mod prelude {
    pub use crate::{DatabaseConfig, PgHandle, PgProvider, PgTx, SqlxErrorExt};
    pub use kiln_data::prelude::*;
}

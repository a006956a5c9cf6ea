//! Kiln: transactional data access with connection self-healing, and
//! resilient outbound HTTP calls.
//!
//! This facade crate re-exports the Kiln sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use kiln::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature     | Default | Crate                        |
//! |-------------|---------|------------------------------|
//! | `data`      | **yes** | `kiln-data` (executor, provider traits, pagination) |
//! | `data-sqlx` | no      | `kiln-data-sqlx` (PostgreSQL) |
//! | `http`      | no      | `kiln-http` (resilient caller) |
//! | `full`      | no      | All of the above             |
//!
//! # Example
//!
//! ```ignore
//! use kiln::prelude::*;
//!
//! let config = KilnConfig::load("dev")?;
//! let _log = init_tracing(&config.section::<LogConfig>()?)?;
//!
//! let executor = TransactionalExecutor::new(PgProvider::from_config(&config)?)
//!     .with_options(config.section::<ExecutorOptions>()?);
//! executor.delete(DELETE_USER, "user", &sql_args![user_id]).await?;
//!
//! let partner = ResilientCaller::from_config(&config)?;
//! partner.call(PARTNER_URL, "script=nightly").await?;
//! ```

pub extern crate kiln_core;

// Re-export everything from kiln-core at the top level for convenience.
pub use kiln_core::*;

#[cfg(feature = "data")]
pub use kiln_data;

#[cfg(feature = "data-sqlx")]
pub use kiln_data_sqlx;

#[cfg(feature = "http")]
pub use kiln_http;

/// Unified prelude: `use kiln::prelude::*`.
///
/// Includes the core prelude plus types from all enabled feature crates.
pub mod prelude {
    pub use kiln_core::prelude::*;

    #[cfg(feature = "data")]
    pub use kiln_data::prelude::*;

    #[cfg(feature = "data-sqlx")]
    pub use kiln_data_sqlx::prelude::*;

    #[cfg(feature = "http")]
    pub use kiln_http::prelude::*;
}

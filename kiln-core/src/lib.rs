//! # kiln-core: shared foundations
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | [`OperationError`] and its [`ErrorKind`] taxonomy, the only error the executor and caller return |
//! | [`config`] | Layered YAML/.env/environment configuration ([`KilnConfig`]) and typed sections ([`ConfigProperties`]) |
//! | [`logging`] | `tracing-subscriber` setup and a runtime log-level handle |

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    ConfigError, ConfigProperties, ConfigValue, DefaultSecretResolver, FromConfigValue,
    KilnConfig, SecretResolver,
};
pub use error::{ErrorKind, OperationError};
pub use logging::{init_tracing, LogConfig, LogFormat, LogLevelHandle};

pub mod prelude {
    //! Re-exports of the most commonly used core types.
    pub use crate::{
        init_tracing, ConfigProperties, ErrorKind, KilnConfig, LogConfig, LogLevelHandle,
        OperationError,
    };
}

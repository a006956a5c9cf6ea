//! # kiln-http: resilient outbound calls
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ResilientCaller`] | GET with linear-backoff retries on transport failure |
//! | [`HttpTransport`] | One-attempt transport seam, implemented by [`ReqwestTransport`] |
//! | [`CallerConfig`] | `outbound.*` configuration section |
//!
//! ```ignore
//! let caller = ResilientCaller::from_config(&config)?;
//! caller
//!     .call_with_query("https://partner.example.com/run", &[("script", "nightly")])
//!     .await?;
//! ```

pub mod caller;
pub mod config;
pub mod transport;

pub use caller::ResilientCaller;
pub use config::CallerConfig;
pub use transport::{HttpTransport, RawResponse, ReqwestTransport, TransportError};

pub mod prelude {
    //! Re-exports of the most commonly used outbound types.
    pub use crate::{CallerConfig, HttpTransport, ResilientCaller, ReqwestTransport};
}

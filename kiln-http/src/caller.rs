//! Outbound GET with linear-backoff retries.

use std::time::Duration;

use bytes::Bytes;
use kiln_core::{ConfigError, ErrorKind, KilnConfig, OperationError};
use tracing::{debug, error, info, warn};

use crate::config::CallerConfig;
use crate::transport::{HttpTransport, RawResponse, ReqwestTransport, TransportError};

/// Retries transport failures with a linearly growing pause, then classifies
/// the outcome into an [`OperationError`].
///
/// Only transport failures are retried. A response with any status other than
/// the configured success code ends the call immediately, as does a body that
/// cannot be read. Each call runs its attempts sequentially; the retry loop as
/// a whole is unbounded in time unless the caller wraps it in a timeout.
pub struct ResilientCaller<T = ReqwestTransport> {
    transport: T,
    config: CallerConfig,
}

impl ResilientCaller<ReqwestTransport> {
    /// Caller over a `reqwest` client with `config.attempt_timeout` per attempt.
    pub fn new(config: CallerConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.attempt_timeout)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Build from the `outbound.*` section.
    pub fn from_config(config: &KilnConfig) -> Result<Self, ConfigError> {
        let section: CallerConfig = config.section()?;
        Self::new(section).map_err(|e| ConfigError::Load(format!("HTTP client: {e}")))
    }
}

impl<T: HttpTransport> ResilientCaller<T> {
    pub fn with_transport(transport: T, config: CallerConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    /// `GET {url}?{params}`; `params` is an already encoded query string.
    ///
    /// Returns the body of the successful response.
    pub async fn call(&self, url: &str, params: &str) -> Result<Bytes, OperationError> {
        let target = if params.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{params}")
        };
        debug!(url = %target, "Outbound URL formed");

        let mut retries: u32 = 0;
        let mut last_status: u16 = 0;
        loop {
            match self.transport.get(&target).await {
                Ok(response) => return self.classify(&target, response),
                Err(err) => {
                    if let Some(status) = err.status() {
                        last_status = status.as_u16();
                    }
                    if retries >= self.config.max_retries {
                        error!(
                            url = %target,
                            attempts = retries + 1,
                            error = %err,
                            "Outbound call failed after retries"
                        );
                        return Err(OperationError::with_status(
                            ErrorKind::RetriesExhausted,
                            last_status,
                            format!("Failed to make GET request after retries -> {err}"),
                        ));
                    }
                    retries += 1;
                    let backoff = self.backoff(retries);
                    warn!(
                        url = %target,
                        retry = retries,
                        ?backoff,
                        error = %err,
                        "Outbound call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Like [`call`](Self::call), URL-encoding `pairs` into the query string.
    pub async fn call_with_query(
        &self,
        url: &str,
        pairs: &[(&str, &str)],
    ) -> Result<Bytes, OperationError> {
        let params = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.call(url, &params).await
    }

    /// Pause before retry number `retry` (1-based), saturating at `Duration::MAX`.
    fn backoff(&self, retry: u32) -> Duration {
        self.config.initial_backoff.saturating_mul(retry)
    }

    fn classify(&self, target: &str, response: RawResponse) -> Result<Bytes, OperationError> {
        let status = response.status;
        debug!(url = %target, status = status.as_u16(), "Reading response body");

        let body = response.body.map_err(|e| {
            error!(
                url = %target,
                status = status.as_u16(),
                error = %e,
                "Failed to read response body"
            );
            OperationError::with_status(
                ErrorKind::ResponseReadFailed,
                status.as_u16(),
                format!("Failed to read response body -> {e}"),
            )
        })?;
        let text = String::from_utf8_lossy(&body);
        info!(url = %target, status = status.as_u16(), body = %text, "Outbound response received");

        if status != self.config.success_status {
            return Err(OperationError::with_status(
                ErrorKind::NonSuccessResponse,
                status.as_u16(),
                format!("Received non-OK HTTP status: {text}"),
            ));
        }
        info!(url = %target, "Outbound call succeeded");
        Ok(body)
    }
}

//! The transport seam under [`ResilientCaller`](crate::ResilientCaller).
//!
//! Uses RPITIT (return-position `impl Trait` in traits), no `async-trait`
//! needed.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;

/// A transport-level failure: no response, or a response whose body could
/// not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    status: Option<StatusCode>,
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Status of the response the failure happened on, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// A received response. The body read can fail independently of the
/// status line.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Result<Bytes, TransportError>,
}

/// Issues one GET request per call, with no retry of its own.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Use a client configured elsewhere.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from(e).with_status(status));
        Ok(RawResponse { status, body })
    }
}

//! HTTP transport port

use async_trait::async_trait;
use tollgate_domain::{HttpResponse, RawFailure, RequestDescriptor};

/// Failures that happen before an HTTP response exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request exceeded its timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The descriptor URL could not be resolved.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request was cancelled before completing.
    #[error("request cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Converts the error into the classifier's input.
    #[must_use]
    pub fn to_raw_failure(&self) -> RawFailure {
        RawFailure::NoResponse {
            message: self.to_string(),
        }
    }
}

/// Port that performs one HTTP exchange.
///
/// Implementations return every received response, including 4xx and 5xx,
/// as `Ok`; only the absence of a response is an `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns the response.
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError>;
}

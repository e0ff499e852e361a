//! Domain error types

use thiserror::Error;

/// Domain-level errors raised while building or decoding domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The HTTP method is not supported.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// A request body could not be encoded as JSON.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// A response body did not decode into the expected shape.
    #[error("invalid response payload: {0}")]
    InvalidPayload(String),

    /// The backend issued a grant missing one of the two tokens.
    #[error("incomplete token grant: {0}")]
    IncompleteGrant(&'static str),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

//! Stable error taxonomy surfaced to callers of the authenticated client.

mod classifier;

pub use classifier::{RawFailure, classify};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The access token is expired and could not be renewed.
    TokenExpired,
    /// No usable token is available, or the stored one is malformed.
    InvalidToken,
    /// No HTTP response was received.
    NetworkError,
    /// The server rejected the request payload (400).
    ValidationError,
    /// Any other failure status.
    ServerError,
    /// Too many requests (429).
    RateLimitExceeded,
    /// Authenticated but not allowed (403).
    PermissionDenied,
    /// Resource does not exist (404).
    ResourceNotFound,
}

impl ErrorCode {
    /// Returns the wire name of the code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
        }
    }

    /// Message used when the server did not provide one.
    #[must_use]
    pub const fn default_message(&self) -> &'static str {
        match self {
            Self::TokenExpired => "Your session has expired. Please log in again.",
            Self::InvalidToken => "You are not authenticated. Please log in.",
            Self::NetworkError => "Network error. Please check your connection.",
            Self::ValidationError => "The request contains invalid data.",
            Self::ServerError => "An unexpected server error occurred.",
            Self::RateLimitExceeded => "Too many requests. Please try again later.",
            Self::PermissionDenied => "You do not have permission to perform this action.",
            Self::ResourceNotFound => "The requested resource was not found.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure mapped onto the taxonomy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    /// Human-readable message.
    pub message: String,
    /// HTTP status, `0` when no response was received.
    pub http_status: u16,
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Opaque details, typically the server's JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ClassifiedError {
    /// Creates an error with an explicit message.
    #[must_use]
    pub fn new(code: ErrorCode, http_status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status,
            code,
            details: None,
        }
    }

    /// Creates an error carrying the code's default message.
    #[must_use]
    pub fn from_code(code: ErrorCode, http_status: u16) -> Self {
        Self::new(code, http_status, code.default_message())
    }

    /// Attaches opaque details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Terminal authentication failure wrapping the reason the session ended.
    #[must_use]
    pub fn session_expired(cause: &Self) -> Self {
        Self::from_code(ErrorCode::TokenExpired, 401).with_details(serde_json::json!({
            "cause": cause.code,
            "causeMessage": cause.message,
            "causeStatus": cause.http_status,
        }))
    }
}

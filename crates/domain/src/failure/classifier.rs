//! Raw failure to [`ClassifiedError`] mapping.

use super::{ClassifiedError, ErrorCode};

/// A failure as observed by the transport, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// The request never produced an HTTP response (connect error, timeout,
    /// cancellation).
    NoResponse {
        /// Transport-level description.
        message: String,
    },
    /// A response was received but is a failure.
    Response {
        /// Status code, if one could be read.
        status: Option<u16>,
        /// Raw body.
        body: Vec<u8>,
    },
}

impl RawFailure {
    /// Builds a response failure from a status and body.
    #[must_use]
    pub fn response(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::Response {
            status: Some(status),
            body: body.into(),
        }
    }
}

/// Maps a raw failure onto the error taxonomy.
///
/// Deterministic and free of side effects; notifications are layered on top
/// by the pipeline.
#[must_use]
pub fn classify(failure: &RawFailure) -> ClassifiedError {
    match failure {
        RawFailure::NoResponse { message } => {
            ClassifiedError::from_code(ErrorCode::NetworkError, 0)
                .with_details(serde_json::json!({ "transport": message }))
        }
        RawFailure::Response { status, body } => {
            let code = match status {
                Some(400) => ErrorCode::ValidationError,
                Some(401) => ErrorCode::TokenExpired,
                Some(403) => ErrorCode::PermissionDenied,
                Some(404) => ErrorCode::ResourceNotFound,
                Some(429) => ErrorCode::RateLimitExceeded,
                _ => ErrorCode::ServerError,
            };
            let details = serde_json::from_slice::<serde_json::Value>(body).ok();
            let message = details
                .as_ref()
                .and_then(server_message)
                .unwrap_or_else(|| code.default_message().to_string());

            ClassifiedError {
                message,
                http_status: status.unwrap_or(0),
                code,
                details,
            }
        }
    }
}

fn server_message(body: &serde_json::Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(serde_json::Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code_for(status: Option<u16>) -> ErrorCode {
        classify(&RawFailure::Response {
            status,
            body: Vec::new(),
        })
        .code
    }

    #[test]
    fn status_table() {
        assert_eq!(code_for(Some(400)), ErrorCode::ValidationError);
        assert_eq!(code_for(Some(401)), ErrorCode::TokenExpired);
        assert_eq!(code_for(Some(403)), ErrorCode::PermissionDenied);
        assert_eq!(code_for(Some(404)), ErrorCode::ResourceNotFound);
        assert_eq!(code_for(Some(429)), ErrorCode::RateLimitExceeded);
        assert_eq!(code_for(Some(500)), ErrorCode::ServerError);
        assert_eq!(code_for(Some(418)), ErrorCode::ServerError);
        assert_eq!(code_for(None), ErrorCode::ServerError);
    }

    #[test]
    fn no_response_is_network_error() {
        let error = classify(&RawFailure::NoResponse {
            message: "connection refused".to_string(),
        });
        assert_eq!(error.code, ErrorCode::NetworkError);
        assert_eq!(error.http_status, 0);
    }

    #[test]
    fn prefers_server_message() {
        let error = classify(&RawFailure::response(
            400,
            br#"{"message":"email is required","field":"email"}"#.to_vec(),
        ));
        assert_eq!(error.message, "email is required");
        assert_eq!(error.http_status, 400);
        assert_eq!(
            error.details,
            Some(serde_json::json!({ "message": "email is required", "field": "email" }))
        );
    }

    #[test]
    fn falls_back_to_default_message_for_plain_body() {
        let error = classify(&RawFailure::response(503, b"upstream down".to_vec()));
        assert_eq!(error.message, ErrorCode::ServerError.default_message());
        assert_eq!(error.details, None);
    }

    #[test]
    fn classification_is_deterministic() {
        let failure = RawFailure::response(429, br#"{"error":"slow down"}"#.to_vec());
        assert_eq!(classify(&failure), classify(&failure));
    }
}

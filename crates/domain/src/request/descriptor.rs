//! Caller-facing request descriptor.
//!
//! Descriptors are treated as values: attaching a token or preparing a
//! replay returns a new descriptor instead of mutating the one in flight.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::HttpMethod;
use crate::credential::bearer;
use crate::error::{DomainError, DomainResult};

/// Header carrying the bearer token.
pub const AUTHORIZATION: &str = "Authorization";

/// Per-request switches for the interceptor pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestFlags {
    /// Bypass both interceptors: no token, no 401 handling.
    #[serde(default)]
    pub skip_auth: bool,
    /// Suppress notifications; the classified error is still returned.
    #[serde(default)]
    pub skip_error_handling: bool,
}

/// An outgoing request as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Absolute URL, or a path resolved against the configured base URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Raw request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Pipeline switches.
    #[serde(default)]
    pub flags: RequestFlags,
    /// How many times this request has already been replayed after a 401.
    #[serde(default)]
    pub replay_count: u8,
}

impl RequestDescriptor {
    /// Creates a descriptor with no headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            flags: RequestFlags::default(),
            replay_count: 0,
        }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Shorthand for a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidBody`] if the value cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> DomainResult<Self> {
        let body =
            serde_json::to_string(value).map_err(|e| DomainError::InvalidBody(e.to_string()))?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Marks the request as unauthenticated.
    #[must_use]
    pub const fn skip_auth(mut self) -> Self {
        self.flags.skip_auth = true;
        self
    }

    /// Suppresses notification side effects for this request.
    #[must_use]
    pub const fn skip_error_handling(mut self) -> Self {
        self.flags.skip_error_handling = true;
        self
    }

    /// Returns whether the pipeline must authenticate this request.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        !self.flags.skip_auth
    }

    /// Returns a copy carrying `access_token` as its bearer token.
    #[must_use]
    pub fn with_bearer(&self, access_token: &str) -> Self {
        let mut next = self.clone();
        next.headers
            .retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION));
        next.headers
            .insert(AUTHORIZATION.to_string(), bearer(access_token));
        next
    }

    /// Returns the replay of this request with a fresh token attached.
    #[must_use]
    pub fn replayed_with(&self, access_token: &str) -> Self {
        let mut next = self.with_bearer(access_token);
        next.replay_count = self.replay_count.saturating_add(1);
        next
    }

    /// Returns true once the request has used its single replay.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        self.replay_count >= 1
    }

    /// Returns the bearer token currently attached, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION))
            .and_then(|(_, value)| value.strip_prefix("Bearer "))
    }

    /// Short `METHOD url` label for logs and notifications.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn with_bearer_replaces_existing_authorization() {
        let request = RequestDescriptor::get("/users")
            .with_header("authorization", "Bearer stale")
            .with_bearer("fresh");

        assert_eq!(request.bearer_token(), Some("fresh"));
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.replay_count, 0);
    }

    #[test]
    fn replay_increments_count_and_leaves_original_untouched() {
        let original = RequestDescriptor::get("/users").with_bearer("old");
        let replay = original.replayed_with("new");

        assert!(!original.is_replay());
        assert!(replay.is_replay());
        assert_eq!(original.bearer_token(), Some("old"));
        assert_eq!(replay.bearer_token(), Some("new"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = RequestDescriptor::post("/items")
            .with_json(&serde_json::json!({ "name": "widget" }))
            .unwrap();

        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"widget"}"#));
    }

    #[test]
    fn skip_auth_flag() {
        let request = RequestDescriptor::get("/health").skip_auth();
        assert!(!request.requires_auth());
        assert_eq!(request.label(), "GET /health");
    }
}

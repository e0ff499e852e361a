//! Credential types shared by the token store, the lifecycle manager and the
//! credential backend.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// An access/refresh token pair with its expiry instant.
///
/// Both tokens are always present together; a pair is never partially built.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived token attached to authenticated requests.
    pub access_token: String,
    /// Longer-lived token used only to obtain a new access token.
    pub refresh_token: String,
    /// Expiry as epoch milliseconds.
    pub expires_at_ms: i64,
}

impl CredentialPair {
    /// Creates a pair expiring at `expires_at_ms`.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at_ms: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at_ms,
        }
    }

    /// Returns true once `now_ms` has entered the refresh window that opens
    /// `buffer_ms` before the literal expiry.
    #[must_use]
    pub const fn is_expiring(&self, now_ms: i64, buffer_ms: i64) -> bool {
        now_ms >= self.expires_at_ms.saturating_sub(buffer_ms)
    }

    /// Milliseconds until the literal expiry (negative once expired).
    #[must_use]
    pub const fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }
}

// Tokens stay out of debug output.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &token_preview(&self.access_token))
            .field("refresh_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Formats a bearer `Authorization` header value.
#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Get a preview of a token (first 8 chars + ...).
#[must_use]
pub fn token_preview(token: &str) -> String {
    if token.len() > 12 {
        let cut = token
            .char_indices()
            .nth(8)
            .map_or(token.len(), |(idx, _)| idx);
        format!("{}...", &token[..cut])
    } else {
        token.to_string()
    }
}

/// Logical credential state derived from the stored pair and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenState {
    /// Nothing stored; the caller must authenticate.
    NoCredentials,
    /// A usable access token is stored.
    Valid,
    /// The stored access token is inside the refresh window or past expiry.
    ExpiredNeedsRefresh,
}

impl TokenState {
    /// Returns a short user-facing description.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NoCredentials => "Not authenticated",
            Self::Valid => "Authenticated",
            Self::ExpiredNeedsRefresh => "Session expired, refresh required",
        }
    }
}

/// Token grant returned by `/auth/login` and `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    /// Newly issued access token.
    #[serde(default)]
    pub access_token: String,
    /// Newly issued refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime of the access token in seconds, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    /// Checks that the grant carries both tokens.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::IncompleteGrant`] naming the missing token.
    pub fn validate(&self) -> DomainResult<()> {
        if self.access_token.is_empty() {
            return Err(DomainError::IncompleteGrant("accessToken"));
        }
        if self.refresh_token.is_empty() {
            return Err(DomainError::IncompleteGrant("refreshToken"));
        }
        Ok(())
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// The refresh token being exchanged.
    pub refresh_token: String,
}

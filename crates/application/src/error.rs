//! Application error types

use std::sync::Arc;

use thiserror::Error;
use tollgate_domain::ClassifiedError;

/// Terminal outcome of a failed token refresh.
///
/// Every caller that joined or queued behind one refresh receives a clone of
/// the same value; the classified error inside is shared, not duplicated.
#[derive(Debug, Clone, Error)]
#[error("token refresh failed: {0}")]
pub struct RefreshFailed(Arc<ClassifiedError>);

impl RefreshFailed {
    /// Builds the terminal `TOKEN_EXPIRED` error for a refresh that failed
    /// because of `cause`.
    #[must_use]
    pub fn from_cause(cause: &ClassifiedError) -> Self {
        Self(Arc::new(ClassifiedError::session_expired(cause)))
    }

    /// Refresh task ended without reporting an outcome.
    #[must_use]
    pub fn abandoned() -> Self {
        Self::from_cause(&ClassifiedError::new(
            tollgate_domain::ErrorCode::NetworkError,
            0,
            "token refresh was abandoned before completing",
        ))
    }

    /// The classified error surfaced to callers.
    #[must_use]
    pub fn error(&self) -> &ClassifiedError {
        &self.0
    }

    /// Returns true if both values share the same underlying error object.
    #[must_use]
    pub fn is_same_failure(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<RefreshFailed> for ClassifiedError {
    fn from(failure: RefreshFailed) -> Self {
        Arc::unwrap_or_clone(failure.0)
    }
}

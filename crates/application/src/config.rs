//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by the lifecycle manager, the pipeline and the adapters.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for relative request paths and the `/auth/*` endpoints.
    pub base_url: String,
    /// How long before the literal expiry a token counts as expired.
    pub refresh_buffer_secs: u64,
    /// Access token lifetime assumed when a grant omits `expiresIn`.
    pub default_ttl_secs: u64,
    /// Upper bound on one refresh call.
    pub refresh_timeout_ms: u64,
    /// Upper bound on one regular request.
    pub request_timeout_ms: u64,
    /// Idle time after which an authenticated session is dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout_minutes: Option<u64>,
    /// Whether successful writes trigger a success notification.
    pub notify_on_write_success: bool,
    /// Where credentials are persisted; the host picks a default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            refresh_buffer_secs: 60,
            default_ttl_secs: 3600,
            refresh_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            session_timeout_minutes: None,
            notify_on_write_success: false,
            storage_path: None,
        }
    }
}

impl ClientConfig {
    /// Creates the default configuration pointing at `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Refresh buffer in milliseconds.
    #[must_use]
    pub fn refresh_buffer_ms(&self) -> i64 {
        secs_to_ms(self.refresh_buffer_secs)
    }

    /// Refresh call timeout.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Regular request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Converts seconds to milliseconds, saturating at `i64::MAX`.
pub(crate) fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

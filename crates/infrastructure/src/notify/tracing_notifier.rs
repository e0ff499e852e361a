//! Notification sink that writes to the tracing subscriber.

use tollgate_application::ports::NotificationSink;
use tollgate_domain::ClassifiedError;
use tracing::{error, info, warn};

/// Logs every notification; used by hosts without a UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Creates the notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NotificationSink for TracingNotifier {
    fn notify_auth_error(&self) {
        warn!("session expired, log in again");
    }

    fn notify_success(&self, message: &str) {
        info!(%message, "request succeeded");
    }

    fn notify_error(&self, failure: &ClassifiedError) {
        error!(
            code = %failure.code,
            status = failure.http_status,
            message = %failure.message,
            "request failed"
        );
    }
}

//! Notification sink port

use tollgate_domain::ClassifiedError;

/// Receives user-facing notifications from the pipeline.
///
/// The core never renders or queues notifications itself; the host decides
/// how to surface them (toast, redirect to a login surface, log line).
pub trait NotificationSink: Send + Sync {
    /// Authentication was lost and the user must log in again.
    fn notify_auth_error(&self);

    /// A write operation succeeded.
    fn notify_success(&self, message: &str);

    /// A request failed with a non-authentication error.
    fn notify_error(&self, error: &ClassifiedError) {
        let _ = error;
    }
}

//! Authenticated HTTP client.
//!
//! [`AuthenticatedClient::execute`] wraps every request in two interceptors.
//! The outgoing one attaches a valid bearer token, refreshing first when the
//! stored one is expiring. The incoming one turns a 401 into a single replay
//! after a refresh, and classifies every other failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tollgate_domain::{
    ClassifiedError, CredentialPair, ErrorCode, HttpMethod, HttpResponse, RawFailure,
    RequestDescriptor, RequestFlags, classify,
};
use tracing::{debug, info, warn};

use crate::auth::TokenLifecycle;
use crate::config::ClientConfig;
use crate::error::RefreshFailed;
use crate::ports::{HttpTransport, NotificationSink};

/// How a request failed, which decides the side effects.
enum Failure {
    /// Authentication is gone; the user has to log in again.
    Auth(ClassifiedError),
    /// Any other classified failure.
    Request(ClassifiedError),
}

impl From<RefreshFailed> for Failure {
    fn from(failure: RefreshFailed) -> Self {
        Self::Auth(failure.into())
    }
}

/// HTTP client that keeps requests authenticated.
pub struct AuthenticatedClient {
    transport: Arc<dyn HttpTransport>,
    lifecycle: Arc<TokenLifecycle>,
    notifier: Arc<dyn NotificationSink>,
    /// Set once the auth error has been signalled; re-armed by login.
    auth_error_signalled: AtomicBool,
    session_timeout_minutes: Option<u64>,
    notify_on_write_success: bool,
}

impl AuthenticatedClient {
    /// Creates a client sending through `transport`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        lifecycle: Arc<TokenLifecycle>,
        notifier: Arc<dyn NotificationSink>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            lifecycle,
            notifier,
            auth_error_signalled: AtomicBool::new(false),
            session_timeout_minutes: config.session_timeout_minutes,
            notify_on_write_success: config.notify_on_write_success,
        }
    }

    /// The lifecycle manager behind this client.
    #[must_use]
    pub fn lifecycle(&self) -> &TokenLifecycle {
        &self.lifecycle
    }

    /// Logs in and re-arms the auth error notification.
    ///
    /// # Errors
    ///
    /// Returns the classified login failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialPair, ClassifiedError> {
        let pair = self.lifecycle.login(email, password).await?;
        self.auth_error_signalled.store(false, Ordering::Release);
        Ok(pair)
    }

    /// Drops the stored credentials.
    pub fn logout(&self) {
        self.lifecycle.logout();
    }

    /// Sends `request` through the interceptor pipeline.
    ///
    /// # Errors
    ///
    /// Returns the classified failure. Authentication failures are terminal:
    /// credentials are cleared before the error is returned.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<HttpResponse, ClassifiedError> {
        let method = request.method;
        let flags = request.flags;
        let label = request.label();

        let outcome = if request.requires_auth() {
            self.send_authenticated(request).await
        } else {
            self.send_plain(&request).await
        };

        match outcome {
            Ok(response) => {
                self.report_success(method, flags, &label);
                Ok(response)
            }
            Err(Failure::Auth(error)) => {
                self.terminate(&label, &error);
                Err(error)
            }
            Err(Failure::Request(error)) => {
                debug!(request = %label, code = %error.code, status = error.http_status, "request failed");
                if !flags.skip_error_handling {
                    self.notifier.notify_error(&error);
                }
                Err(error)
            }
        }
    }

    /// `GET url`.
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub async fn get(&self, url: impl Into<String>) -> Result<HttpResponse, ClassifiedError> {
        self.execute(RequestDescriptor::get(url)).await
    }

    /// `POST url` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_ERROR` if `body` cannot be serialized, otherwise see
    /// [`Self::execute`].
    pub async fn post_json<T>(&self, url: impl Into<String>, body: &T) -> Result<HttpResponse, ClassifiedError>
    where
        T: Serialize + ?Sized,
    {
        let request = RequestDescriptor::post(url)
            .with_json(body)
            .map_err(|e| ClassifiedError::new(ErrorCode::ValidationError, 0, e.to_string()))?;
        self.execute(request).await
    }

    /// `PUT url` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_ERROR` if `body` cannot be serialized, otherwise see
    /// [`Self::execute`].
    pub async fn put_json<T>(&self, url: impl Into<String>, body: &T) -> Result<HttpResponse, ClassifiedError>
    where
        T: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(HttpMethod::Put, url)
            .with_json(body)
            .map_err(|e| ClassifiedError::new(ErrorCode::ValidationError, 0, e.to_string()))?;
        self.execute(request).await
    }

    /// `DELETE url`.
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub async fn delete(&self, url: impl Into<String>) -> Result<HttpResponse, ClassifiedError> {
        self.execute(RequestDescriptor::new(HttpMethod::Delete, url)).await
    }

    async fn send_plain(&self, request: &RequestDescriptor) -> Result<HttpResponse, Failure> {
        let response = self.transmit(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(Failure::Request(classify_response(response)))
        }
    }

    async fn send_authenticated(&self, request: RequestDescriptor) -> Result<HttpResponse, Failure> {
        let mut attempt = self.authorize(request).await?;
        loop {
            let response = self.transmit(&attempt).await?;
            if response.is_success() {
                return Ok(response);
            }
            if !response.is_unauthorized() {
                return Err(Failure::Request(classify_response(response)));
            }
            if attempt.is_replay() {
                warn!(request = %attempt.label(), "replayed request rejected again");
                let rejection = classify_response(response);
                return Err(Failure::Auth(ClassifiedError::session_expired(&rejection)));
            }
            attempt = self.reauthorize(attempt).await?;
        }
    }

    /// Outgoing interceptor.
    async fn authorize(&self, request: RequestDescriptor) -> Result<RequestDescriptor, Failure> {
        let Some(mut pair) = self.lifecycle.current() else {
            debug!(request = %request.label(), "no stored credentials");
            return Err(Failure::Auth(ClassifiedError::from_code(
                ErrorCode::InvalidToken,
                401,
            )));
        };

        if let Some(minutes) = self.session_timeout_minutes
            && self.lifecycle.is_session_expired(minutes)
        {
            info!(timeout_minutes = minutes, "session idle past timeout");
            let idle = ClassifiedError::new(ErrorCode::TokenExpired, 401, "Session timed out");
            return Err(Failure::Auth(ClassifiedError::session_expired(&idle)));
        }

        if self.lifecycle.is_expiring(&pair) {
            debug!(request = %request.label(), "access token expiring, refreshing first");
            pair = self.lifecycle.refresh_unless_renewed(&pair.access_token).await?;
        }

        self.lifecycle.touch();
        Ok(request.with_bearer(&pair.access_token))
    }

    /// Prepares the single replay of a request rejected with 401.
    async fn reauthorize(&self, rejected: RequestDescriptor) -> Result<RequestDescriptor, Failure> {
        let stale = rejected.bearer_token().unwrap_or_default().to_string();

        if let Some(current) = self.lifecycle.current()
            && current.access_token != stale
            && !self.lifecycle.is_expiring(&current)
        {
            debug!(request = %rejected.label(), "token already renewed, replaying");
            return Ok(rejected.replayed_with(&current.access_token));
        }

        match self.lifecycle.queue().enqueue(rejected) {
            Ok(pending) => {
                let replay = pending.wait().await?;
                if replay.bearer_token() != Some(stale.as_str()) {
                    return Ok(replay);
                }
                // The refresh settled on the token this request was rejected
                // with, so renew it before the one replay.
                debug!(request = %replay.label(), "refresh kept the rejected token, renewing");
                let pair = self.lifecycle.refresh_unless_renewed(&stale).await?;
                Ok(replay.with_bearer(&pair.access_token))
            }
            Err(rejected) => {
                let pair = self.lifecycle.refresh_unless_renewed(&stale).await?;
                debug!(request = %rejected.label(), "replaying after refresh");
                Ok(rejected.replayed_with(&pair.access_token))
            }
        }
    }

    async fn transmit(&self, request: &RequestDescriptor) -> Result<HttpResponse, Failure> {
        self.transport.send(request).await.map_err(|e| {
            warn!(request = %request.label(), err = %e, "transport failure");
            Failure::Request(classify(&e.to_raw_failure()))
        })
    }

    fn report_success(&self, method: HttpMethod, flags: RequestFlags, label: &str) {
        if self.notify_on_write_success && !method.is_read() && !flags.skip_error_handling {
            self.notifier.notify_success(&format!("{label} succeeded"));
        }
    }

    /// Clears credentials and signals the auth error once until next login.
    fn terminate(&self, label: &str, error: &ClassifiedError) {
        warn!(request = %label, code = %error.code, "authentication lost");
        self.lifecycle.logout();
        if !self.auth_error_signalled.swap(true, Ordering::AcqRel) {
            self.notifier.notify_auth_error();
        }
    }
}

fn classify_response(response: HttpResponse) -> ClassifiedError {
    classify(&RawFailure::Response {
        status: Some(response.status),
        body: response.body,
    })
}

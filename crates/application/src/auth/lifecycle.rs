//! Token lifecycle: expiry checks, login, logout and refresh.

use std::sync::Arc;
use std::time::Duration;

use tollgate_domain::{ClassifiedError, CredentialPair, DomainError, ErrorCode, TokenGrant, TokenState};
use tracing::{debug, info, warn};

use super::request_queue::{RefreshOutcome, RequestQueue};
use super::token_store::TokenStore;
use crate::config::{ClientConfig, secs_to_ms};
use crate::error::RefreshFailed;
use crate::ports::AuthBackend;

/// Decides when credentials need renewing and performs the renewal through
/// the single-flight queue.
pub struct TokenLifecycle {
    store: Arc<TokenStore>,
    backend: Arc<dyn AuthBackend>,
    queue: RequestQueue,
    refresh_buffer_ms: i64,
    refresh_timeout: Duration,
}

impl TokenLifecycle {
    /// Creates a lifecycle manager over `store`, refreshing through `queue`.
    pub fn new(
        store: Arc<TokenStore>,
        backend: Arc<dyn AuthBackend>,
        queue: RequestQueue,
        config: &ClientConfig,
    ) -> Self {
        Self {
            store,
            backend,
            queue,
            refresh_buffer_ms: config.refresh_buffer_ms(),
            refresh_timeout: config.refresh_timeout(),
        }
    }

    /// The refresh coordinator shared with the request pipeline.
    #[must_use]
    pub const fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Current state derived from the stored pair and the clock.
    #[must_use]
    pub fn state(&self) -> TokenState {
        match self.store.get() {
            None => TokenState::NoCredentials,
            Some(pair) if self.is_expiring(&pair) => TokenState::ExpiredNeedsRefresh,
            Some(_) => TokenState::Valid,
        }
    }

    /// True unless a pair is stored and outside the refresh buffer.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state() != TokenState::Valid
    }

    /// True when no activity was recorded within `timeout_minutes`.
    #[must_use]
    pub fn is_session_expired(&self, timeout_minutes: u64) -> bool {
        let Some(last_activity) = self.store.last_activity() else {
            return true;
        };
        let idle_ms = self.store.now_ms().saturating_sub(last_activity);
        idle_ms > secs_to_ms(timeout_minutes.saturating_mul(60))
    }

    /// The stored pair, whether or not it is expiring.
    #[must_use]
    pub fn current(&self) -> Option<CredentialPair> {
        self.store.get()
    }

    /// Records activity.
    pub fn touch(&self) {
        self.store.touch();
    }

    /// Exchanges credentials for a token pair and stores it.
    ///
    /// # Errors
    ///
    /// Returns the backend's classified error, or `SERVER_ERROR` when the
    /// grant is missing a token.
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialPair, ClassifiedError> {
        let grant = self.backend.login(email, password).await.inspect_err(|e| {
            warn!(code = %e.code, status = e.http_status, "login rejected");
        })?;
        grant.validate().map_err(|e| incomplete_grant(&e))?;

        let pair = self
            .store
            .set(&grant.access_token, &grant.refresh_token, grant.expires_in);
        info!(expires_in_ms = pair.remaining_ms(self.store.now_ms()), "logged in");
        Ok(pair)
    }

    /// Drops the stored credentials.
    pub fn logout(&self) {
        self.store.clear();
        info!("logged out");
    }

    /// Renews the access token unconditionally.
    ///
    /// Concurrent callers share one backend call. Any failure, timeout
    /// included, clears the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns the shared terminal failure of the refresh.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.queue.refresh(self.job(None).run()).await
    }

    /// Renews the access token unless the stored one already differs from
    /// `stale_access_token` and is still valid, in which case the stored pair
    /// is returned without a backend call.
    ///
    /// Callers that observed an expired or rejected token use this so that a
    /// refresh completed by someone else in the meantime is not repeated.
    ///
    /// # Errors
    ///
    /// Returns the shared terminal failure of the refresh.
    pub async fn refresh_unless_renewed(&self, stale_access_token: &str) -> RefreshOutcome {
        self.queue
            .refresh(self.job(Some(stale_access_token.to_string())).run())
            .await
    }

    fn job(&self, stale_access_token: Option<String>) -> RefreshJob {
        RefreshJob {
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            refresh_buffer_ms: self.refresh_buffer_ms,
            refresh_timeout: self.refresh_timeout,
            stale_access_token,
        }
    }

    /// True when `pair` is inside the refresh buffer.
    pub(crate) fn is_expiring(&self, pair: &CredentialPair) -> bool {
        pair.is_expiring(self.store.now_ms(), self.refresh_buffer_ms)
    }
}

/// Everything one refresh needs, owned so it can run in its own task.
struct RefreshJob {
    store: Arc<TokenStore>,
    backend: Arc<dyn AuthBackend>,
    refresh_buffer_ms: i64,
    refresh_timeout: Duration,
    stale_access_token: Option<String>,
}

impl RefreshJob {
    async fn run(self) -> RefreshOutcome {
        let Some((current, epoch)) = self.store.get_with_epoch() else {
            warn!("refresh requested without stored credentials");
            return Err(RefreshFailed::from_cause(&ClassifiedError::from_code(
                ErrorCode::TokenExpired,
                401,
            )));
        };

        if let Some(stale) = &self.stale_access_token
            && current.access_token != *stale
            && !current.is_expiring(self.store.now_ms(), self.refresh_buffer_ms)
        {
            debug!("credentials renewed by an earlier refresh, reusing them");
            return Ok(current);
        }

        info!("refreshing access token");
        match self.exchange(&current.refresh_token).await {
            Ok(grant) => {
                let Some(pair) = self.store.set_if_epoch(
                    epoch,
                    &grant.access_token,
                    &grant.refresh_token,
                    grant.expires_in,
                ) else {
                    return self.superseded();
                };
                info!(
                    expires_in_ms = pair.remaining_ms(self.store.now_ms()),
                    "access token refreshed"
                );
                Ok(pair)
            }
            Err(cause) => {
                warn!(
                    code = %cause.code,
                    status = cause.http_status,
                    message = %cause.message,
                    "token refresh failed, clearing credentials"
                );
                if !self.store.clear_if_epoch(epoch) {
                    return self.superseded();
                }
                Err(RefreshFailed::from_cause(&cause))
            }
        }
    }

    /// Outcome when the credentials were logged out or replaced while the
    /// backend call ran: whatever is stored now wins over the result.
    fn superseded(&self) -> RefreshOutcome {
        match self.store.get() {
            Some(pair) => {
                debug!("credentials replaced during refresh, discarding its result");
                Ok(pair)
            }
            None => {
                info!("signed out during refresh, discarding its result");
                Err(RefreshFailed::from_cause(&ClassifiedError::new(
                    ErrorCode::TokenExpired,
                    401,
                    "Signed out during token refresh",
                )))
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant, ClassifiedError> {
        let grant = tokio::time::timeout(self.refresh_timeout, self.backend.refresh(refresh_token))
            .await
            .map_err(|_| {
                let timeout_ms = u64::try_from(self.refresh_timeout.as_millis()).unwrap_or(u64::MAX);
                ClassifiedError::new(
                    ErrorCode::NetworkError,
                    0,
                    format!("token refresh timed out after {timeout_ms}ms"),
                )
            })??;
        grant.validate().map_err(|e| incomplete_grant(&e))?;
        Ok(grant)
    }
}

fn incomplete_grant(error: &DomainError) -> ClassifiedError {
    ClassifiedError::new(ErrorCode::ServerError, 500, error.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{ManualClock, MemoryStorage, ScriptedBackend, grant};
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;

    struct Fixture {
        lifecycle: Arc<TokenLifecycle>,
        store: Arc<TokenStore>,
        backend: Arc<ScriptedBackend>,
        clock: Arc<ManualClock>,
    }

    fn fixture_with(backend: ScriptedBackend, config: &ClientConfig) -> Fixture {
        let clock = Arc::new(ManualClock::at(NOW));
        let store = Arc::new(TokenStore::new(
            Arc::new(MemoryStorage::default()),
            clock.clone(),
            config.default_ttl_secs,
        ));
        let backend = Arc::new(backend);
        let lifecycle = Arc::new(TokenLifecycle::new(
            Arc::clone(&store),
            backend.clone(),
            RequestQueue::new(),
            config,
        ));
        Fixture {
            lifecycle,
            store,
            backend,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedBackend::new(), &ClientConfig::default())
    }

    #[test]
    fn state_follows_expiry_and_buffer() {
        let f = fixture();
        assert_eq!(f.lifecycle.state(), TokenState::NoCredentials);
        assert!(f.lifecycle.is_expired());

        f.store.set("access", "refresh", Some(120));
        assert_eq!(f.lifecycle.state(), TokenState::Valid);

        // 59 s left is inside the 60 s buffer.
        f.clock.advance(61_000);
        assert_eq!(f.lifecycle.state(), TokenState::ExpiredNeedsRefresh);
        assert!(f.lifecycle.is_expired());
    }

    #[test]
    fn session_expiry_uses_last_activity() {
        let f = fixture();
        assert!(f.lifecycle.is_session_expired(30));

        f.store.set("access", "refresh", None);
        f.clock.advance(30 * 60_000);
        assert!(!f.lifecycle.is_session_expired(30));

        f.clock.advance(1);
        assert!(f.lifecycle.is_session_expired(30));

        f.lifecycle.touch();
        assert!(!f.lifecycle.is_session_expired(30));
    }

    #[tokio::test]
    async fn login_stores_grant() {
        let f = fixture();
        f.backend
            .set_login(Ok(grant("login-access", "login-refresh", Some(900))));

        let pair = f.lifecycle.login("ada@example.com", "hunter2").await.unwrap();

        assert_eq!(f.backend.login_calls(), 1);
        assert_eq!(pair.access_token, "login-access");
        assert_eq!(pair.expires_at_ms, NOW + 900_000);
        assert_eq!(f.lifecycle.current(), Some(pair));
    }

    #[tokio::test]
    async fn login_rejects_incomplete_grant() {
        let f = fixture();
        f.backend.set_login(Ok(grant("access", "", None)));

        let err = f.lifecycle.login("ada@example.com", "hunter2").await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(f.lifecycle.current(), None);
    }

    #[tokio::test]
    async fn login_failure_is_returned_as_classified() {
        let f = fixture();
        f.backend.set_login(Err(ClassifiedError::new(
            ErrorCode::ValidationError,
            400,
            "Invalid credentials",
        )));

        let err = f.lifecycle.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Invalid credentials");
    }

    #[tokio::test]
    async fn logout_clears_credentials() {
        let f = fixture();
        f.store.set("access", "refresh", None);

        f.lifecycle.logout();

        assert_eq!(f.lifecycle.state(), TokenState::NoCredentials);
    }

    #[tokio::test]
    async fn refresh_replaces_pair() {
        let f = fixture();
        f.store.set("old-access", "old-refresh", Some(10));

        let pair = f.lifecycle.refresh().await.unwrap();

        assert_eq!(pair.access_token, "access-1");
        assert_eq!(pair.refresh_token, "refresh-1");
        assert_eq!(f.backend.refresh_tokens_seen(), vec!["old-refresh"]);
        assert_eq!(f.lifecycle.state(), TokenState::Valid);
    }

    #[tokio::test]
    async fn refresh_failure_clears_credentials() {
        let f = fixture();
        f.store.set("access", "refresh", Some(10));
        f.backend.reject_refresh(401);

        let failure = f.lifecycle.refresh().await.unwrap_err();

        assert_eq!(failure.error().code, ErrorCode::TokenExpired);
        assert_eq!(failure.error().http_status, 401);
        assert_eq!(f.lifecycle.state(), TokenState::NoCredentials);
    }

    #[tokio::test]
    async fn refresh_without_credentials_fails_without_backend_call() {
        let f = fixture();

        let failure = f.lifecycle.refresh().await.unwrap_err();

        assert_eq!(failure.error().code, ErrorCode::TokenExpired);
        assert_eq!(f.backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn incomplete_refresh_grant_is_a_failure() {
        let f = fixture();
        f.store.set("access", "refresh", Some(10));
        f.backend.push_refresh(Ok(grant("new-access", "", Some(60))));

        let failure = f.lifecycle.refresh().await.unwrap_err();

        assert_eq!(failure.error().code, ErrorCode::TokenExpired);
        assert_eq!(f.lifecycle.current(), None);
    }

    #[tokio::test]
    async fn refresh_timeout_clears_credentials() {
        let config = ClientConfig {
            refresh_timeout_ms: 50,
            ..ClientConfig::default()
        };
        let f = fixture_with(
            ScriptedBackend::new().with_refresh_delay(Duration::from_secs(5)),
            &config,
        );
        f.store.set("access", "refresh", Some(10));

        let failure = f.lifecycle.refresh().await.unwrap_err();

        let details = failure.error().details.clone().unwrap();
        assert_eq!(details["cause"], "NETWORK_ERROR");
        assert_eq!(f.lifecycle.current(), None);
        assert!(!f.lifecycle.queue().is_refreshing());
    }

    #[tokio::test]
    async fn logout_during_refresh_is_not_undone() {
        let f = fixture_with(
            ScriptedBackend::new().with_refresh_delay(Duration::from_millis(100)),
            &ClientConfig::default(),
        );
        f.store.set("access", "refresh", Some(10));

        let lifecycle = Arc::clone(&f.lifecycle);
        let refresh = tokio::spawn(async move { lifecycle.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        f.lifecycle.logout();

        let failure = refresh.await.unwrap().unwrap_err();

        assert_eq!(failure.error().code, ErrorCode::TokenExpired);
        assert_eq!(f.backend.refresh_calls(), 1);
        assert_eq!(f.lifecycle.current(), None);
        assert_eq!(f.lifecycle.state(), TokenState::NoCredentials);
    }

    #[tokio::test]
    async fn login_during_failing_refresh_is_kept() {
        let f = fixture_with(
            ScriptedBackend::new().with_refresh_delay(Duration::from_millis(100)),
            &ClientConfig::default(),
        );
        f.backend.reject_refresh(401);
        f.store.set("access", "refresh", Some(10));

        let lifecycle = Arc::clone(&f.lifecycle);
        let refresh = tokio::spawn(async move { lifecycle.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let login = f.lifecycle.login("ada@example.com", "hunter2").await.unwrap();

        let pair = refresh.await.unwrap().unwrap();

        assert_eq!(pair, login);
        assert_eq!(f.lifecycle.current(), Some(login));
    }

    #[tokio::test]
    async fn refresh_unless_renewed_reuses_newer_token() {
        let f = fixture();
        let renewed = f.store.set("renewed", "refresh", Some(600));

        let pair = f.lifecycle.refresh_unless_renewed("stale").await.unwrap();

        assert_eq!(pair, renewed);
        assert_eq!(f.backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn refresh_unless_renewed_refreshes_matching_token() {
        let f = fixture();
        f.store.set("stale", "refresh", Some(600));

        let pair = f.lifecycle.refresh_unless_renewed("stale").await.unwrap();

        assert_eq!(pair.access_token, "access-1");
        assert_eq!(f.backend.refresh_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_share_one_call() {
        let f = fixture_with(
            ScriptedBackend::new().with_refresh_delay(Duration::from_millis(50)),
            &ClientConfig::default(),
        );
        f.store.set("expired", "refresh", Some(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let lifecycle = Arc::clone(&f.lifecycle);
                tokio::spawn(async move { lifecycle.refresh_unless_renewed("expired").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().access_token, "access-1");
        }

        assert_eq!(f.backend.refresh_calls(), 1);
    }
}

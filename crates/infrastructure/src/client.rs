//! Wiring of the authenticated client from the HTTP adapters.

use std::sync::Arc;

use tollgate_application::ports::{KeyValueStorage, NotificationSink, TransportError};
use tollgate_application::{AuthenticatedClient, ClientConfig, RequestQueue, TokenLifecycle, TokenStore};

use crate::adapters::{ReqwestTransport, SystemClock};
use crate::auth::HttpAuthBackend;

/// Builds a client talking to `config.base_url` over reqwest, keeping its
/// credentials in `storage`.
///
/// # Errors
///
/// Returns an error if the base URL is invalid or an HTTP client cannot be
/// built.
pub fn build_client(
    config: &ClientConfig,
    storage: Arc<dyn KeyValueStorage>,
    notifier: Arc<dyn NotificationSink>,
) -> Result<AuthenticatedClient, TransportError> {
    let store = Arc::new(TokenStore::new(
        storage,
        Arc::new(SystemClock::new()),
        config.default_ttl_secs,
    ));
    let backend = Arc::new(HttpAuthBackend::new(config)?);
    let lifecycle = Arc::new(TokenLifecycle::new(
        store,
        backend,
        RequestQueue::new(),
        config,
    ));
    let transport = Arc::new(ReqwestTransport::new(config)?);

    Ok(AuthenticatedClient::new(transport, lifecycle, notifier, config))
}

//! Credential backend speaking the `/auth/login` and `/auth/refresh` JSON
//! endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tollgate_application::ClientConfig;
use tollgate_application::ports::{AuthBackend, TransportError};
use tollgate_domain::{
    ClassifiedError, ErrorCode, LoginRequest, RawFailure, RefreshRequest, TokenGrant, classify,
};
use tracing::debug;

use crate::adapters::{USER_AGENT, map_error};
use crate::http::Endpoint;

const LOGIN_PATH: &str = "auth/login";
const REFRESH_PATH: &str = "auth/refresh";

/// `AuthBackend` over HTTP.
///
/// Uses its own client, without redirects, so credential exchanges never
/// pass through the authenticated pipeline.
pub struct HttpAuthBackend {
    http_client: Client,
    endpoint: Endpoint,
    timeout_ms: u64,
}

impl HttpAuthBackend {
    /// Creates a backend for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be
    /// built.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = Endpoint::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{e}: {}", config.base_url)))?;
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            timeout_ms: config.request_timeout_ms,
        })
    }

    async fn exchange<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<TokenGrant, ClassifiedError> {
        let url = self.endpoint.resolve(path);
        debug!(%url, "credential exchange");

        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(&map_error(&e, self.timeout_ms).to_raw_failure()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(&RawFailure::NoResponse { message: e.to_string() }))?;

        if !(200..300).contains(&status) {
            return Err(classify(&RawFailure::response(status, bytes.to_vec())));
        }

        serde_json::from_slice::<TokenGrant>(&bytes).map_err(|e| {
            ClassifiedError::new(
                ErrorCode::ServerError,
                status,
                format!("malformed token response: {e}"),
            )
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ClassifiedError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.exchange(LOGIN_PATH, &body).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ClassifiedError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.exchange(REFRESH_PATH, &body).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base_url() {
        let config = ClientConfig::with_base_url("::nope::");
        assert!(matches!(
            HttpAuthBackend::new(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn endpoints_sit_under_the_base_path() {
        let backend = HttpAuthBackend::new(&ClientConfig::default()).unwrap();
        assert_eq!(
            backend.endpoint.resolve(REFRESH_PATH).as_str(),
            "http://localhost:3000/api/auth/refresh"
        );
    }
}

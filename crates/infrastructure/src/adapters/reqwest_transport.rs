//! HTTP transport implementation using reqwest.
//!
//! Every response that arrives, whatever its status, is handed back to the
//! pipeline; only failures to get a response become [`TransportError`]s.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tollgate_application::ClientConfig;
use tollgate_application::ports::{HttpTransport, TransportError};
use tollgate_domain::{HttpMethod, HttpResponse, RequestDescriptor};
use tracing::trace;

use crate::http::Endpoint;

/// User agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("tollgate/", env!("CARGO_PKG_VERSION"));

/// `HttpTransport` backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
    endpoint: Endpoint,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport for `config.base_url` with the configured request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be
    /// built.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Self::with_client(client, config)
    }

    /// Creates a transport around an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn with_client(client: Client, config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = Endpoint::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{e}: {}", config.base_url)))?;
        Ok(Self {
            client,
            endpoint,
            timeout: config.request_timeout(),
        })
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Maps reqwest errors onto the transport port's error type.
pub(crate) fn map_error(error: &reqwest::Error, timeout_ms: u64) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout { timeout_ms };
    }
    if error.is_connect() {
        return TransportError::ConnectionFailed(error.to_string());
    }
    if error.is_builder() {
        return TransportError::InvalidUrl(error.to_string());
    }
    TransportError::Other(error.to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let url = self.endpoint.resolve(&request.url);
        trace!(method = %request.method, %url, replay = request.replay_count, "sending request");

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_error(&e, self.timeout_ms()))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read body: {e}")))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

//! In-memory port implementations for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tollgate_domain::{ClassifiedError, ErrorCode, HttpResponse, RequestDescriptor, TokenGrant};

use crate::ports::{
    AuthBackend, Clock, HttpTransport, KeyValueStorage, NotificationSink, StorageError,
    TransportError,
};

/// Map-backed storage that can be switched off.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().unwrap().is_empty()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("disabled by test".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub const fn at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms()).unwrap_or_default()
    }

    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Credential backend with scripted refresh results.
///
/// Unscripted refreshes succeed with `access-N` / `refresh-N`, where N is the
/// call number.
#[derive(Default)]
pub struct ScriptedBackend {
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    refresh_delay: Mutex<Duration>,
    refresh_results: Mutex<VecDeque<Result<TokenGrant, ClassifiedError>>>,
    login_result: Mutex<Option<Result<TokenGrant, ClassifiedError>>>,
    refresh_tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        *self.refresh_delay.lock().unwrap() = delay;
        self
    }

    pub fn push_refresh(&self, result: Result<TokenGrant, ClassifiedError>) {
        self.refresh_results.lock().unwrap().push_back(result);
    }

    pub fn reject_refresh(&self, status: u16) {
        self.push_refresh(Err(ClassifiedError::from_code(
            if status == 401 {
                ErrorCode::TokenExpired
            } else {
                ErrorCode::ServerError
            },
            status,
        )));
    }

    pub fn set_login(&self, result: Result<TokenGrant, ClassifiedError>) {
        *self.login_result.lock().unwrap() = Some(result);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().unwrap().clone()
    }
}

pub fn grant(access: &str, refresh: &str, expires_in: Option<u64>) -> TokenGrant {
    TokenGrant {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_in,
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<TokenGrant, ClassifiedError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(grant("access-login", "refresh-login", Some(3600))))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ClassifiedError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.refresh_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(grant(
                &format!("access-{call}"),
                &format!("refresh-{call}"),
                Some(3600),
            ))
        })
    }
}

/// Transport that authorizes by bearer token and echoes the request.
///
/// Requests without a bearer token, or carrying a rejected one, get a 401
/// unless they skip auth. Per-URL overrides take precedence.
#[derive(Default)]
pub struct EchoTransport {
    rejected: Mutex<HashSet<String>>,
    statuses: Mutex<HashMap<String, u16>>,
    failures: Mutex<HashMap<String, TransportError>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl EchoTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, token: &str) {
        self.rejected.lock().unwrap().insert(token.to_string());
    }

    pub fn respond(&self, url: &str, status: u16) {
        self.statuses.lock().unwrap().insert(url.to_string(), status);
    }

    pub fn fail(&self, url: &str, error: TransportError) {
        self.failures.lock().unwrap().insert(url.to_string(), error);
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<RequestDescriptor> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for EchoTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(error) = self.failures.lock().unwrap().get(&request.url) {
            return Err(error.clone());
        }
        if let Some(status) = self.statuses.lock().unwrap().get(&request.url) {
            return Ok(HttpResponse::json_body(
                *status,
                &json!({ "message": format!("scripted {status}") }),
            ));
        }

        let token = request.bearer_token().map(str::to_string);
        let authorized = match &token {
            Some(token) => !self.rejected.lock().unwrap().contains(token),
            None => !request.requires_auth(),
        };
        if !authorized {
            return Ok(HttpResponse::json_body(
                401,
                &json!({ "message": "Token expired" }),
            ));
        }

        Ok(HttpResponse::json_body(
            200,
            &json!({ "url": request.url, "token": token }),
        ))
    }
}

/// Notification sink that counts what it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    auth_errors: AtomicUsize,
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<ErrorCode>>,
}

impl RecordingNotifier {
    pub fn auth_errors(&self) -> usize {
        self.auth_errors.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ErrorCode> {
        self.errors.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_auth_error(&self) {
        self.auth_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn notify_error(&self, error: &ClassifiedError) {
        self.errors.lock().unwrap().push(error.code);
    }
}

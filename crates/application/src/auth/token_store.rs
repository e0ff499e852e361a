//! Persisted credential storage with expiry and activity tracking.
//!
//! The store keeps four string fields in a [`KeyValueStorage`]. Reads and
//! writes never fail from the caller's point of view: an unavailable backend
//! behaves like an empty one, and a partially written or malformed record is
//! treated as tampering and wiped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tollgate_domain::CredentialPair;
use tracing::warn;

use crate::config::secs_to_ms;
use crate::ports::{Clock, KeyValueStorage, StorageError};

/// Storage keys used by the token store.
pub mod keys {
    /// Access token.
    pub const ACCESS_TOKEN: &str = "tollgate.access_token";
    /// Refresh token.
    pub const REFRESH_TOKEN: &str = "tollgate.refresh_token";
    /// Access token expiry, epoch milliseconds.
    pub const TOKEN_EXPIRY: &str = "tollgate.token_expiry";
    /// Last authenticated activity, epoch milliseconds.
    pub const LAST_ACTIVITY: &str = "tollgate.last_activity";

    /// Every key owned by the store.
    pub const ALL: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, TOKEN_EXPIRY, LAST_ACTIVITY];
}

/// What the backend currently holds.
enum Stored {
    Empty,
    Pair(CredentialPair),
    Malformed(&'static str),
}

/// Credential store over a key-value backend.
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    default_ttl_secs: u64,
    /// Serializes multi-key reads and writes. Holds the credential epoch,
    /// bumped whenever the pair is replaced or removed.
    guard: Mutex<u64>,
}

impl TokenStore {
    /// Creates a store; grants without a lifetime expire after
    /// `default_ttl_secs`.
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        default_ttl_secs: u64,
    ) -> Self {
        Self {
            storage,
            clock,
            default_ttl_secs,
            guard: Mutex::new(0),
        }
    }

    /// Current time according to the store's clock, epoch milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Returns the stored credentials, or `None` when absent, unreadable or
    /// malformed.
    #[must_use]
    pub fn get(&self) -> Option<CredentialPair> {
        self.get_with_epoch().map(|(pair, _)| pair)
    }

    /// Like [`Self::get`], also returning the epoch the pair was read at.
    ///
    /// The epoch changes on every `set` and `clear`, so a writer can tell
    /// whether the credentials it started from are still the stored ones.
    #[must_use]
    pub fn get_with_epoch(&self) -> Option<(CredentialPair, u64)> {
        let mut epoch = self.lock();
        match self.read_pair() {
            Ok(Stored::Pair(pair)) => Some((pair, *epoch)),
            Ok(Stored::Empty) => None,
            Ok(Stored::Malformed(reason)) => {
                warn!(reason, "discarding malformed stored credentials");
                self.remove_all();
                *epoch += 1;
                None
            }
            Err(e) => {
                warn!(err = %e, "credential storage unreadable, treating as signed out");
                None
            }
        }
    }

    /// Persists a new pair expiring `ttl_secs` from now (or after the default
    /// lifetime) and records the current time as last activity.
    pub fn set(
        &self,
        access_token: &str,
        refresh_token: &str,
        ttl_secs: Option<u64>,
    ) -> CredentialPair {
        let mut epoch = self.lock();
        self.write_pair(&mut *epoch, access_token, refresh_token, ttl_secs)
    }

    /// Persists a new pair only if nothing replaced or removed the stored one
    /// since `expected_epoch` was read.
    ///
    /// Returns `None`, writing nothing, when the epoch has moved on.
    pub fn set_if_epoch(
        &self,
        expected_epoch: u64,
        access_token: &str,
        refresh_token: &str,
        ttl_secs: Option<u64>,
    ) -> Option<CredentialPair> {
        let mut epoch = self.lock();
        if *epoch != expected_epoch {
            return None;
        }
        Some(self.write_pair(&mut *epoch, access_token, refresh_token, ttl_secs))
    }

    /// Removes every stored field.
    pub fn clear(&self) {
        let mut epoch = self.lock();
        self.remove_all();
        *epoch += 1;
    }

    /// Removes every stored field unless the pair changed since
    /// `expected_epoch`. Returns whether anything was cleared.
    pub fn clear_if_epoch(&self, expected_epoch: u64) -> bool {
        let mut epoch = self.lock();
        if *epoch != expected_epoch {
            return false;
        }
        self.remove_all();
        *epoch += 1;
        true
    }

    fn write_pair(
        &self,
        epoch: &mut u64,
        access_token: &str,
        refresh_token: &str,
        ttl_secs: Option<u64>,
    ) -> CredentialPair {
        let now = self.now_ms();
        let ttl_ms = secs_to_ms(ttl_secs.unwrap_or(self.default_ttl_secs));
        let pair = CredentialPair::new(access_token, refresh_token, now.saturating_add(ttl_ms));

        let entries = [
            (keys::ACCESS_TOKEN, pair.access_token.clone()),
            (keys::REFRESH_TOKEN, pair.refresh_token.clone()),
            (keys::TOKEN_EXPIRY, pair.expires_at_ms.to_string()),
            (keys::LAST_ACTIVITY, now.to_string()),
        ];
        if let Err(e) = self.storage.set_many(&entries) {
            warn!(err = %e, "failed to persist credentials");
        }
        *epoch += 1;
        pair
    }

    /// Records activity without touching the tokens.
    pub fn touch(&self) {
        let now = self.now_ms().to_string();
        let _guard = self.lock();
        if let Err(e) = self.storage.set(keys::LAST_ACTIVITY, &now) {
            warn!(err = %e, "failed to record activity");
        }
    }

    /// Last recorded activity, epoch milliseconds.
    #[must_use]
    pub fn last_activity(&self) -> Option<i64> {
        let _guard = self.lock();
        match self.storage.get(keys::LAST_ACTIVITY) {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(e) => {
                warn!(err = %e, "failed to read activity");
                None
            }
        }
    }

    fn read_pair(&self) -> Result<Stored, StorageError> {
        let access = self.storage.get(keys::ACCESS_TOKEN)?;
        let refresh = self.storage.get(keys::REFRESH_TOKEN)?;
        let expiry = self.storage.get(keys::TOKEN_EXPIRY)?;

        Ok(match (access, refresh, expiry) {
            (None, None, None) => Stored::Empty,
            (Some(access), Some(refresh), Some(expiry)) => {
                if access.is_empty() || refresh.is_empty() {
                    Stored::Malformed("empty token")
                } else {
                    match expiry.parse::<i64>() {
                        Ok(expires_at_ms) => {
                            Stored::Pair(CredentialPair::new(access, refresh, expires_at_ms))
                        }
                        Err(_) => Stored::Malformed("unparseable expiry"),
                    }
                }
            }
            _ => Stored::Malformed("partial credential record"),
        })
    }

    fn remove_all(&self) {
        if let Err(e) = self.storage.remove_many(&keys::ALL) {
            warn!(err = %e, "failed to clear stored credentials");
        }
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

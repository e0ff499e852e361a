//! Tollgate Application - Use cases and ports
//!
//! This crate holds the authenticated client core: the token store, the
//! token lifecycle, the single-flight refresh queue and the interceptor
//! pipeline. External systems are reached only through the traits in
//! [`ports`]; the infrastructure crate provides the adapters.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use auth::{PendingReplay, RefreshOutcome, RequestQueue, TokenLifecycle, TokenStore};
pub use client::AuthenticatedClient;
pub use config::ClientConfig;
pub use error::RefreshFailed;

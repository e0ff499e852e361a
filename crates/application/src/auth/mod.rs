//! Credential handling for the authenticated client.
//!
//! This module provides:
//! - Persisted token storage with expiry and activity tracking
//! - The token lifecycle (expiry checks, login, logout, refresh)
//! - The single-flight refresh coordinator and replay queue

mod lifecycle;
mod request_queue;
mod token_store;

pub use lifecycle::TokenLifecycle;
pub use request_queue::{PendingReplay, RefreshOutcome, RequestQueue};
pub use token_store::{TokenStore, keys};

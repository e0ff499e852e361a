//! Tollgate Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus config file loading.

pub mod adapters;
pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod notify;
pub mod persistence;
pub mod serialization;

pub use adapters::{ReqwestTransport, SystemClock};
pub use auth::HttpAuthBackend;
pub use client::build_client;
pub use config::{ConfigError, default_config_path, load_config};
pub use http::Endpoint;
pub use notify::TracingNotifier;
pub use persistence::{FileStorage, MemoryStorage};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

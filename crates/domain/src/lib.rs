//! Tollgate Domain - Core types
//!
//! This crate defines the domain model of the authenticated HTTP client:
//! credentials, request descriptors, responses and the error taxonomy.
//! All types here are pure Rust with no I/O dependencies.

pub mod credential;
pub mod error;
pub mod failure;
pub mod request;
pub mod response;

pub use credential::{
    CredentialPair, LoginRequest, RefreshRequest, TokenGrant, TokenState, bearer, token_preview,
};
pub use error::{DomainError, DomainResult};
pub use failure::{ClassifiedError, ErrorCode, RawFailure, classify};
pub use request::{HttpMethod, RequestDescriptor, RequestFlags};
pub use response::HttpResponse;

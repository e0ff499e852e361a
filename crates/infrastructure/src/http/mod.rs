//! HTTP infrastructure utilities shared by the transport and the credential
//! backend.

mod endpoint;

pub use endpoint::Endpoint;

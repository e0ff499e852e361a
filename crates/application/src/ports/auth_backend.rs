//! Credential issuance backend port

use async_trait::async_trait;
use tollgate_domain::{ClassifiedError, TokenGrant};

/// Port for the backend that issues credentials.
///
/// Only the login and refresh exchanges are modelled; every other endpoint
/// goes through the regular transport.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchanges an email/password pair for a token grant.
    async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ClassifiedError>;

    /// Exchanges a refresh token for a new token grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ClassifiedError>;
}

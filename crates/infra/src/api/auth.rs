//! Bearer token seam between the request executor and the token manager

use async_trait::async_trait;
use fleetlink_common::auth::{CredentialCacheTrait, TokenExchangerTrait, TokenManager};

use super::errors::ApiError;

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token
    ///
    /// This method should handle token refresh if needed.
    async fn access_token(&self) -> Result<String, ApiError>;

    /// Forget the current token so the next call mints a new one.
    async fn invalidate(&self) {}
}

#[async_trait]
impl<E, C> AccessTokenProvider for TokenManager<E, C>
where
    E: TokenExchangerTrait + 'static,
    C: CredentialCacheTrait + ?Sized + 'static,
{
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.get_valid_token().await?.access_token)
    }

    async fn invalidate(&self) {
        self.invalidate_token().await;
    }
}

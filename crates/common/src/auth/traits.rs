//! Traits for token exchange and credential caching
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (the identity provider, the on-disk cache).

use async_trait::async_trait;
use fleetlink_domain::Identity;

use super::exchanger::ExchangeError;
use super::types::{AccessToken, SignedAssertion};

/// Trait for exchanging a client assertion for an access token
#[async_trait]
pub trait TokenExchangerTrait: Send + Sync {
    /// Exchange `assertion` for a bearer token on behalf of `identity`.
    ///
    /// The returned token's `expires_at` must already have the refresh
    /// buffer subtracted.
    ///
    /// # Errors
    /// Returns error if the provider rejects the grant, the transport fails
    /// or the response cannot be decoded
    async fn exchange(
        &self,
        assertion: &SignedAssertion,
        identity: &Identity,
    ) -> Result<AccessToken, ExchangeError>;
}

/// Trait for the advisory assertion/token cache
///
/// Loads return `None` for anything that should not be trusted (missing,
/// corrupt, foreign or stale entries). Saves never fail the caller; errors
/// are logged by the implementation.
#[async_trait]
pub trait CredentialCacheTrait: Send + Sync {
    async fn load_assertion(&self, identity: &Identity) -> Option<SignedAssertion>;

    async fn save_assertion(&self, identity: &Identity, assertion: &SignedAssertion);

    async fn load_token(&self, identity: &Identity) -> Option<AccessToken>;

    async fn save_token(&self, identity: &Identity, token: &AccessToken);

    /// Drop a cached token (idempotent).
    async fn remove_token(&self, identity: &Identity);
}

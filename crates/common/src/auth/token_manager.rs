//! Token manager with double-checked refresh
//!
//! Owns the process-wide assertion and access token for one [`Identity`]:
//! - Seeds both values from the credential cache
//! - Serves the bearer token from a read lock while it is fresh
//! - Refreshes under a write lock, re-checking freshness first so concurrent
//!   callers racing past a stale read collapse into a single exchange
//! - Optional background refresh task

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use fleetlink_domain::constants::DEFAULT_REFRESH_BUFFER_SECS;
use fleetlink_domain::Identity;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::exchanger::ExchangeError;
use super::signer::{AssertionSigner, SigningError};
use super::traits::{CredentialCacheTrait, TokenExchangerTrait};
use super::types::{AccessToken, SignedAssertion, TokenState};
use crate::observability::TransportLog;

/// Delay before the background task retries a failed refresh.
const AUTO_REFRESH_RETRY: StdDuration = StdDuration::from_secs(60);

/// Shortest sleep between two successful background refreshes.
const AUTO_REFRESH_FLOOR: StdDuration = StdDuration::from_secs(1);

/// Error type for token manager operations
#[derive(Debug, Error)]
pub enum TokenManagerError {
    /// The client assertion could not be produced (bad key material).
    #[error("assertion signing failed: {0}")]
    Signing(#[from] SigningError),

    /// The token endpoint refused or could not be reached.
    #[error("token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),
}

impl TokenManagerError {
    /// Configuration problems that no amount of retrying will fix.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Signing(_))
    }
}

/// Which cached values were accepted by [`TokenManager::initialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSeed {
    pub assertion: bool,
    pub token: bool,
}

/// Token manager for a single credential.
///
/// Lock order is token, then assertion. Nothing else takes both.
pub struct TokenManager<E, C>
where
    E: TokenExchangerTrait + 'static,
    C: CredentialCacheTrait + ?Sized + 'static,
{
    identity: Identity,
    signer: AssertionSigner,
    exchanger: Arc<E>,
    cache: Arc<C>,
    assertion: RwLock<Option<SignedAssertion>>,
    token: RwLock<Option<AccessToken>>,
    refresh_buffer: Duration,
    log: TransportLog,
}

impl<E, C> std::fmt::Debug for TokenManager<E, C>
where
    E: TokenExchangerTrait + 'static,
    C: CredentialCacheTrait + ?Sized + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("fingerprint", self.identity.fingerprint())
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}

impl<E, C> TokenManager<E, C>
where
    E: TokenExchangerTrait + 'static,
    C: CredentialCacheTrait + ?Sized + 'static,
{
    /// Create a token manager with empty in-memory state.
    ///
    /// Call [`TokenManager::initialize`] to seed from the cache up front; if
    /// skipped, the cache is consulted lazily on the first refresh.
    #[must_use]
    pub fn new(identity: Identity, signer: AssertionSigner, exchanger: E, cache: Arc<C>) -> Self {
        Self {
            identity,
            signer,
            exchanger: Arc::new(exchanger),
            cache,
            assertion: RwLock::new(None),
            token: RwLock::new(None),
            refresh_buffer: Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS),
            log: TransportLog::disabled(),
        }
    }

    /// Margin kept before the assertion's real expiry.
    #[must_use]
    pub fn with_refresh_buffer(mut self, refresh_buffer: Duration) -> Self {
        self.refresh_buffer = refresh_buffer;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, log: TransportLog) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn refresh_buffer(&self) -> Duration {
        self.refresh_buffer
    }

    /// Load both caches into memory.
    ///
    /// Only values that pass the cache's fingerprint and freshness checks are
    /// accepted. Never touches the network.
    pub async fn initialize(&self) -> CacheSeed {
        let mut token_guard = self.token.write().await;
        let mut assertion_guard = self.assertion.write().await;

        let mut seed = CacheSeed::default();

        if let Some(assertion) = self.cache.load_assertion(&self.identity).await {
            *assertion_guard = Some(assertion);
            seed.assertion = true;
        }
        if let Some(token) = self.cache.load_token(&self.identity).await {
            *token_guard = Some(token);
            seed.token = true;
        }

        info!(
            fingerprint = %self.identity.fingerprint(),
            assertion = seed.assertion,
            token = seed.token,
            "token_manager.initialized"
        );
        self.log.auth_event(
            "token manager initialized",
            &[
                ("fingerprint", self.identity.fingerprint().to_string()),
                ("assertion_cached", seed.assertion.to_string()),
                ("token_cached", seed.token.to_string()),
            ],
        );

        seed
    }

    /// Return a fresh access token, refreshing it if needed.
    ///
    /// # Errors
    /// Returns [`TokenManagerError`] when a new assertion cannot be signed or
    /// the exchange fails. In-memory state is left as it was.
    pub async fn get_valid_token(&self) -> Result<AccessToken, TokenManagerError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.clone());
            }
        }

        let mut guard = self.token.write().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            debug!(fingerprint = %self.identity.fingerprint(), "token_manager.refreshed_by_peer");
            return Ok(token.clone());
        }

        if let Some(token) = self.cache.load_token(&self.identity).await {
            debug!(fingerprint = %self.identity.fingerprint(), "token_manager.token_from_cache");
            *guard = Some(token.clone());
            return Ok(token);
        }

        let assertion = self.ensure_assertion().await?;

        let exchanged = self.exchanger.exchange(&assertion, &self.identity).await.and_then(|token| {
            if token.is_fresh() {
                Ok(token)
            } else {
                Err(ExchangeError::InvalidResponse(format!(
                    "token already expired at {}",
                    token.expires_at.to_rfc3339()
                )))
            }
        });

        let token = match exchanged {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    fingerprint = %self.identity.fingerprint(),
                    error = %err,
                    "token_manager.refresh_failed"
                );
                return Err(err.into());
            }
        };

        self.cache.save_token(&self.identity, &token).await;
        *guard = Some(token.clone());

        info!(
            fingerprint = %self.identity.fingerprint(),
            expires_at = %token.expires_at,
            "token_manager.refreshed"
        );
        self.log.auth_event(
            "access token refreshed",
            &[
                ("fingerprint", self.identity.fingerprint().to_string()),
                ("expires_at", token.expires_at.to_rfc3339()),
            ],
        );

        Ok(token)
    }

    /// Same double-checked pattern as the token, scoped to the assertion lock.
    async fn ensure_assertion(&self) -> Result<SignedAssertion, TokenManagerError> {
        {
            let guard = self.assertion.read().await;
            if let Some(assertion) = guard.as_ref().filter(|a| a.is_fresh(self.refresh_buffer)) {
                return Ok(assertion.clone());
            }
        }

        let mut guard = self.assertion.write().await;

        if let Some(assertion) = guard.as_ref().filter(|a| a.is_fresh(self.refresh_buffer)) {
            return Ok(assertion.clone());
        }

        if let Some(assertion) = self.cache.load_assertion(&self.identity).await {
            *guard = Some(assertion.clone());
            return Ok(assertion);
        }

        let assertion = self.signer.sign(&self.identity)?;
        self.cache.save_assertion(&self.identity, &assertion).await;
        *guard = Some(assertion.clone());

        info!(
            fingerprint = %self.identity.fingerprint(),
            expires_at = %assertion.expires_at,
            "token_manager.assertion_signed"
        );
        self.log.auth_event(
            "client assertion signed",
            &[
                ("fingerprint", self.identity.fingerprint().to_string()),
                ("key_id", self.identity.key_id().to_string()),
            ],
        );

        Ok(assertion)
    }

    /// Current in-memory token, without refreshing.
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    pub async fn token_state(&self) -> TokenState {
        match self.token.read().await.as_ref() {
            None => TokenState::Missing,
            Some(t) if t.is_fresh() => TokenState::Fresh,
            Some(_) => TokenState::Stale,
        }
    }

    pub async fn assertion_state(&self) -> TokenState {
        match self.assertion.read().await.as_ref() {
            None => TokenState::Missing,
            Some(a) if a.is_fresh(self.refresh_buffer) => TokenState::Fresh,
            Some(_) => TokenState::Stale,
        }
    }

    /// Forget the access token in memory and on disk.
    ///
    /// The assertion is kept; the next call re-exchanges it. Intended for
    /// callers that received a 401 with a token this manager believed fresh.
    pub async fn invalidate_token(&self) {
        *self.token.write().await = None;
        self.cache.remove_token(&self.identity).await;

        info!(fingerprint = %self.identity.fingerprint(), "token_manager.token_invalidated");
        self.log.auth_event(
            "access token invalidated",
            &[("fingerprint", self.identity.fingerprint().to_string())],
        );
    }

    /// Refresh the token ahead of expiry until `cancel` fires.
    ///
    /// Sleeps until the current token goes stale (its expiry is already
    /// buffer-adjusted), refreshes, and repeats. Consecutive refreshes are at
    /// least a second apart. A failed refresh is retried after a minute.
    ///
    /// # Example
    /// ```ignore
    /// # use std::sync::Arc;
    /// # use fleetlink_common::auth::{CredentialCacheTrait, TokenExchangerTrait, TokenManager};
    /// # use tokio_util::sync::CancellationToken;
    /// # fn example<E: TokenExchangerTrait, C: CredentialCacheTrait>(manager: Arc<TokenManager<E, C>>) {
    /// let cancel = CancellationToken::new();
    /// tokio::spawn(manager.start_auto_refresh(cancel.child_token()));
    /// # }
    /// ```
    pub async fn start_auto_refresh(self: Arc<Self>, cancel: CancellationToken) {
        info!(fingerprint = %self.identity.fingerprint(), "token_manager.auto_refresh_started");

        let mut floor = StdDuration::ZERO;

        loop {
            let wake = match self.token.read().await.as_ref() {
                Some(t) => (t.expires_at - Utc::now()).to_std().unwrap_or(StdDuration::ZERO),
                None => StdDuration::ZERO,
            }
            .max(floor);

            if !wake.is_zero() {
                debug!(wake_secs = wake.as_secs(), "token_manager.auto_refresh_sleeping");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(wake) => {}
                }
            }

            if cancel.is_cancelled() {
                break;
            }

            match self.get_valid_token().await {
                Ok(_) => floor = AUTO_REFRESH_FLOOR,
                Err(err) => {
                    warn!(error = %err, "token_manager.auto_refresh_failed");
                    floor = StdDuration::ZERO;
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(AUTO_REFRESH_RETRY) => {}
                    }
                }
            }
        }

        info!(fingerprint = %self.identity.fingerprint(), "token_manager.auto_refresh_stopped");
    }
}

//! API facade
//!
//! Wires the token manager, request executor and activity poller together
//! from a [`Config`]. This is the surface handed to the resource layer.

use std::sync::Arc;

use chrono::Duration;
use fleetlink_common::auth::{
    AccessToken, AssertionSigner, CredentialCacheTrait, DisabledCredentialCache,
    FileCredentialCache, TokenExchanger, TokenManager,
};
use fleetlink_common::observability::{TransportLog, TransportLogger};
use fleetlink_domain::Config;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::activities::ActivityClient;
use super::auth::AccessTokenProvider;
use super::errors::ApiError;
use crate::activity::{ActivityOutcome, ActivityPoller, PollError, PollerConfig};
use crate::http::{ApiRequest, ApiResponse, RequestExecutor, RequestExecutorBuilder};

type SharedTokenManager = TokenManager<TokenExchanger, dyn CredentialCacheTrait>;

/// Authenticated, throttling-aware API client.
#[derive(Clone)]
pub struct ApiClient {
    tokens: Arc<SharedTokenManager>,
    executor: Arc<RequestExecutor>,
    activities: ActivityClient,
    poller: ActivityPoller,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("fingerprint", &self.tokens.identity().fingerprint().to_string())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build every component from configuration and seed the token manager
    /// from the on-disk cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the identity cannot be resolved, the
    /// credential lifetimes are out of range, or the base URL is invalid.
    pub async fn from_config(
        config: &Config,
        logger: Option<Arc<dyn TransportLogger>>,
    ) -> Result<Self, ApiError> {
        config.auth.validate().map_err(|e| ApiError::Config(e.to_string()))?;
        let identity = config.identity.resolve().map_err(|e| ApiError::Config(e.to_string()))?;
        let log = TransportLog::new(logger.clone());
        let refresh_buffer = Duration::seconds(config.auth.refresh_buffer_secs);

        let cache: Arc<dyn CredentialCacheTrait> = if config.auth.cache_enabled {
            Arc::new(
                FileCredentialCache::new(config.auth.resolved_cache_dir(), refresh_buffer)
                    .with_logger(log.clone()),
            )
        } else {
            Arc::new(DisabledCredentialCache)
        };

        let signer = AssertionSigner::new(
            config.auth.audience.clone(),
            Duration::seconds(config.auth.assertion_lifetime_secs),
        );
        let exchanger =
            TokenExchanger::new(config.auth.token_url.clone(), refresh_buffer).with_logger(log.clone());

        let tokens = Arc::new(
            TokenManager::new(identity, signer, exchanger, cache)
                .with_refresh_buffer(refresh_buffer)
                .with_logger(log),
        );
        let seed = tokens.initialize().await;
        info!(
            fingerprint = %tokens.identity().fingerprint(),
            assertion_cached = seed.assertion,
            token_cached = seed.token,
            "api_client.initialized"
        );

        let executor = RequestExecutorBuilder::from_config(&config.http)
            .logger(logger)
            .build(tokens.clone())?;

        Ok(Self::assemble(tokens, executor, PollerConfig::from(&config.polling)))
    }

    fn assemble(
        tokens: Arc<SharedTokenManager>,
        executor: RequestExecutor,
        poller_config: PollerConfig,
    ) -> Self {
        let executor = Arc::new(executor);
        let activities = ActivityClient::new(executor.clone());
        let poller = ActivityPoller::new(Arc::new(activities.clone()), poller_config);

        Self { tokens, executor, activities, poller }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub fn activities(&self) -> &ActivityClient {
        &self.activities
    }

    pub fn token_manager(&self) -> &Arc<SharedTokenManager> {
        &self.tokens
    }

    /// A valid access token, refreshed if needed.
    ///
    /// # Errors
    /// Returns `ApiError::Auth` when signing or the exchange fails.
    pub async fn access_token(&self) -> Result<AccessToken, ApiError> {
        Ok(self.tokens.get_valid_token().await?)
    }

    /// Send a request through the rate-limited executor.
    ///
    /// # Errors
    /// See [`RequestExecutor::execute`].
    pub async fn execute(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.executor.execute(request, cancel).await
    }

    /// Wait for an activity created by a mutating call.
    ///
    /// # Errors
    /// See [`ActivityPoller::await_activity`].
    pub async fn await_activity(
        &self,
        activity_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ActivityOutcome, PollError> {
        self.poller.await_activity(activity_id, cancel).await
    }

    /// GET `path` and decode a JSON body.
    ///
    /// # Errors
    /// Non-2xx responses become `ApiError::Status`. A 401 also drops the
    /// current token so the next call re-authenticates.
    #[instrument(skip(self, cancel))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let response = self.execute(ApiRequest::get(path), cancel).await?;
        self.decode(response).await
    }

    /// POST a JSON body to `path` and decode the JSON response.
    ///
    /// # Errors
    /// Same as [`ApiClient::get_json`].
    #[instrument(skip(self, body, cancel))]
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post_json(path, body)?;
        let response = self.execute(request, cancel).await?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: ApiResponse) -> Result<T, ApiError> {
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "api_client.unauthorized");
            self.tokens.invalidate().await;
        }
        response.error_for_status()?.json()
    }
}

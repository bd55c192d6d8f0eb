use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleetlink_common::observability::{TransportLog, TransportLogger};
use fleetlink_domain::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRY_WAIT_SECS, USER_AGENT,
};
use fleetlink_domain::HttpConfig;
use reqwest::{Client as ReqwestClient, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::request::{ApiRequest, ApiResponse};
use super::retry_after::retry_after_from_headers;
use crate::api::auth::AccessTokenProvider;
use crate::api::errors::ApiError;

/// Authenticated HTTP executor that honours `429 Retry-After`.
///
/// Every attempt carries a freshly obtained bearer token. Only throttling
/// responses are retried; everything else, non-2xx included, is handed back
/// to the caller.
#[derive(Clone)]
pub struct RequestExecutor {
    client: ReqwestClient,
    auth: Arc<dyn AccessTokenProvider>,
    base_url: Option<Url>,
    max_attempts: u32,
    max_retry_wait: Duration,
    log: TransportLog,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("max_attempts", &self.max_attempts)
            .field("max_retry_wait", &self.max_retry_wait)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Start building a new executor.
    pub fn builder() -> RequestExecutorBuilder {
        RequestExecutorBuilder::default()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn max_retry_wait(&self) -> Duration {
        self.max_retry_wait
    }

    pub fn auth(&self) -> &Arc<dyn AccessTokenProvider> {
        &self.auth
    }

    /// Send `request`, retrying on `429` as directed by `Retry-After`.
    ///
    /// # Errors
    /// - `ApiError::Auth` if no token can be obtained
    /// - `ApiError::MissingRetryAfter` / `InvalidRetryAfter` when a `429`
    ///   carries no usable delay
    /// - `ApiError::RetryAfterExceedsCeiling` when the delay is too long
    /// - `ApiError::RetriesExhausted` after `max_attempts` throttled attempts
    /// - `ApiError::Network` / `Timeout` on transport failure (not retried)
    /// - `ApiError::Cancelled` as soon as `cancel` fires
    pub async fn execute(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.resolve_url(request.url())?;
        let attempts = self.max_attempts.max(1);

        for attempt in 1..=attempts {
            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                token = self.auth.access_token() => token?,
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                response = self.send_once(&request, &url, &token, attempt) => response?,
            };

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let wait = retry_after_from_headers(response.headers(), url.as_str(), Utc::now())?;
            if wait > self.max_retry_wait {
                warn!(
                    %url,
                    attempt,
                    wait_secs = wait.as_secs(),
                    ceiling_secs = self.max_retry_wait.as_secs(),
                    "executor.retry_after_exceeds_ceiling"
                );
                return Err(ApiError::RetryAfterExceedsCeiling {
                    wait,
                    ceiling: self.max_retry_wait,
                });
            }

            if attempt == attempts {
                break;
            }

            warn!(%url, attempt, wait_ms = wait.as_millis() as u64, "executor.rate_limited");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }

        warn!(%url, attempts, "executor.retries_exhausted");
        Err(ApiError::RetriesExhausted { attempts, url: url.to_string() })
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        url: &Url,
        token: &str,
        attempt: u32,
    ) -> Result<ApiResponse, ApiError> {
        let method = request.method().clone();
        debug!(attempt, %method, %url, "executor.sending");
        self.log.request(method.as_str(), url.as_str(), request.body().map(|b| b.as_ref()));

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(request.headers().clone())
            .bearer_auth(token);
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response.bytes().await?;

        debug!(attempt, %method, %url, %status, "executor.received");
        let response = ApiResponse::new(status, headers, body, final_url);
        self.log.response(status.as_u16(), &response.header_pairs(), response.body());

        Ok(response)
    }

    fn resolve_url(&self, raw: &str) -> Result<Url, ApiError> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    ApiError::InvalidRequest(format!("relative URL '{raw}' without a base URL"))
                })?;
                base.join(raw)
                    .map_err(|e| ApiError::InvalidRequest(format!("invalid URL '{raw}': {e}")))
            }
            Err(e) => Err(ApiError::InvalidRequest(format!("invalid URL '{raw}': {e}"))),
        }
    }
}

/// Builder for [`RequestExecutor`].
#[derive(Debug)]
pub struct RequestExecutorBuilder {
    base_url: Option<String>,
    timeout: Duration,
    max_attempts: u32,
    max_retry_wait: Duration,
    user_agent: String,
    log: TransportLog,
    client: Option<ReqwestClient>,
}

impl Default for RequestExecutorBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_retry_wait: Duration::from_secs(DEFAULT_MAX_RETRY_WAIT_SECS),
            user_agent: USER_AGENT.to_string(),
            log: TransportLog::disabled(),
            client: None,
        }
    }
}

impl RequestExecutorBuilder {
    /// Seed every setting from an [`HttpConfig`] section.
    pub fn from_config(config: &HttpConfig) -> Self {
        Self::default()
            .base_url(config.base_url.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(config.max_attempts)
            .max_retry_wait(Duration::from_secs(config.max_retry_wait_secs))
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Longest `Retry-After` honoured before failing.
    pub fn max_retry_wait(mut self, wait: Duration) -> Self {
        self.max_retry_wait = wait;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn logger(mut self, logger: Option<Arc<dyn TransportLogger>>) -> Self {
        self.log = TransportLog::new(logger);
        self
    }

    /// Use a preconfigured client; `timeout` and `user_agent` are then ignored.
    pub fn client(mut self, client: ReqwestClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self, auth: Arc<dyn AccessTokenProvider>) -> Result<RequestExecutor, ApiError> {
        let base_url = self
            .base_url
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ApiError::Config(format!("invalid base URL '{raw}': {e}")))
            })
            .transpose()?;

        let client = match self.client {
            Some(client) => client,
            None => ReqwestClient::builder()
                .timeout(self.timeout)
                .user_agent(self.user_agent)
                .build()
                .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?,
        };

        Ok(RequestExecutor {
            client,
            auth,
            base_url,
            max_attempts: self.max_attempts.max(1),
            max_retry_wait: self.max_retry_wait,
            log: self.log,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Default)]
    struct StaticToken {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AccessTokenProvider for StaticToken {
        async fn access_token(&self) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("test-token".to_string())
        }
    }

    fn executor(server: &MockServer, auth: Arc<StaticToken>) -> RequestExecutor {
        RequestExecutor::builder()
            .base_url(server.uri())
            .max_attempts(3)
            .max_retry_wait(Duration::from_secs(5))
            .build(auth)
            .expect("executor builds")
    }

    #[tokio::test]
    async fn test_returns_non_throttled_response_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/missing"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let response = executor(&server, Arc::default())
            .execute(ApiRequest::get("/v1/missing"), &CancellationToken::new())
            .await
            .expect("404 is not an executor error");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "nope");
    }

    #[tokio::test]
    async fn test_token_fetched_per_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let auth = Arc::new(StaticToken::default());
        executor(&server, auth.clone())
            .execute(ApiRequest::get("/v1/x"), &CancellationToken::new())
            .await
            .expect("second attempt succeeds");

        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_names_attempt_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(3)
            .mount(&server)
            .await;

        let err = executor(&server, Arc::default())
            .execute(ApiRequest::get("/v1/x"), &CancellationToken::new())
            .await
            .expect_err("always throttled");

        assert!(matches!(err, ApiError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_relative_url_without_base_is_rejected() {
        let executor = RequestExecutor::builder()
            .build(Arc::new(StaticToken::default()))
            .expect("builds");

        let err = executor
            .execute(ApiRequest::get("/v1/x"), &CancellationToken::new())
            .await
            .expect_err("no base url");
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor(&server, Arc::default())
            .execute(ApiRequest::get("/v1/x"), &cancel)
            .await
            .expect_err("cancelled");

        assert!(matches!(err, ApiError::Cancelled));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = RequestExecutor::builder()
            .base_url("not a url")
            .build(Arc::new(StaticToken::default()))
            .expect_err("invalid");
        assert!(matches!(err, ApiError::Config(_)));
    }
}

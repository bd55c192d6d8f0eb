//! Token endpoint client
//!
//! Exchanges a signed client assertion for a bearer token using the OAuth 2.0
//! client-credentials grant with JWT client authentication (RFC 7523 §2.2).

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fleetlink_domain::constants::{
    CLIENT_ASSERTION_TYPE, CLIENT_CREDENTIALS_GRANT, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_REFRESH_BUFFER_SECS, DEFAULT_TOKEN_URL, USER_AGENT,
};
use fleetlink_domain::Identity;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use super::traits::TokenExchangerTrait;
use super::types::{AccessToken, ProviderErrorBody, SignedAssertion, TokenResponse};
use crate::observability::TransportLog;

/// Errors returned by the token endpoint exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The identity provider rejected the request with an RFC 6749 error body.
    #[error("token endpoint rejected request ({status}): {body}")]
    Provider { status: u16, body: ProviderErrorBody },

    /// Non-success status without a parseable error body.
    #[error("token endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

impl ExchangeError {
    /// HTTP status reported by the endpoint, if one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } | Self::Status { status } => Some(*status),
            Self::Transport(_) | Self::InvalidResponse(_) => None,
        }
    }
}

/// HTTP client for the identity provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: Client,
    token_url: String,
    refresh_buffer: Duration,
    log: TransportLog,
}

impl Default for TokenExchanger {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_URL, Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS))
    }
}

impl TokenExchanger {
    /// Create an exchanger posting to `token_url`.
    ///
    /// `refresh_buffer` is subtracted from the advertised lifetime when the
    /// token's `expires_at` is computed.
    #[must_use]
    pub fn new(token_url: impl Into<String>, refresh_buffer: Duration) -> Self {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, token_url: token_url.into(), refresh_buffer, log: TransportLog::disabled() }
    }

    /// Replace the underlying HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, log: TransportLog) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange `assertion` for an access token.
    ///
    /// # Errors
    /// Returns [`ExchangeError`] on transport failure, a non-2xx status, or a
    /// body that is not a valid token response. Nothing is retried here.
    pub async fn exchange(
        &self,
        assertion: &SignedAssertion,
        identity: &Identity,
    ) -> Result<AccessToken, ExchangeError> {
        let form = [
            ("grant_type", CLIENT_CREDENTIALS_GRANT),
            ("client_id", identity.subject()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.token.as_str()),
            ("scope", identity.scope()),
        ];

        self.log.auth_event(
            "token exchange started",
            &[
                ("url", self.token_url.clone()),
                ("client_id", identity.subject().to_string()),
                ("scope", identity.scope().to_string()),
            ],
        );

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let err = match serde_json::from_slice::<ProviderErrorBody>(&body) {
                Ok(body) => ExchangeError::Provider { status: status.as_u16(), body },
                Err(_) => ExchangeError::Status { status: status.as_u16() },
            };
            warn!(
                status = status.as_u16(),
                fingerprint = %identity.fingerprint(),
                error = %err,
                "token_exchange.rejected"
            );
            self.log.auth_event(
                "token exchange rejected",
                &[("status", status.as_u16().to_string()), ("error", err.to_string())],
            );
            return Err(err);
        }

        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;

        if parsed.access_token.is_empty() {
            return Err(ExchangeError::InvalidResponse("empty access_token".to_string()));
        }
        if parsed.expires_in <= 0 {
            return Err(ExchangeError::InvalidResponse(format!(
                "non-positive expires_in: {}",
                parsed.expires_in
            )));
        }

        let expires_at = self.expiry_for(parsed.expires_in)?;

        debug!(
            fingerprint = %identity.fingerprint(),
            expires_in = parsed.expires_in,
            expires_at = %expires_at,
            "token_exchange.succeeded"
        );
        self.log.auth_event(
            "token exchange succeeded",
            &[("expires_in", parsed.expires_in.to_string()), ("expires_at", expires_at.to_rfc3339())],
        );

        Ok(AccessToken {
            access_token: parsed.access_token,
            token_type: parsed.token_type,
            expires_at,
            scope: parsed.scope,
            fingerprint: identity.fingerprint().clone(),
        })
    }

    /// Buffer-adjusted expiry for an advertised lifetime.
    ///
    /// Lifetimes that do not outlast the refresh buffer, or that overflow
    /// chrono's range, are rejected.
    fn expiry_for(&self, expires_in: i64) -> Result<DateTime<Utc>, ExchangeError> {
        let lifetime = Duration::try_seconds(expires_in).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("expires_in out of range: {expires_in}"))
        })?;

        if lifetime <= self.refresh_buffer {
            return Err(ExchangeError::InvalidResponse(format!(
                "expires_in of {expires_in}s does not exceed the {}s refresh buffer",
                self.refresh_buffer.num_seconds()
            )));
        }

        lifetime
            .checked_sub(&self.refresh_buffer)
            .and_then(|usable| Utc::now().checked_add_signed(usable))
            .ok_or_else(|| {
                ExchangeError::InvalidResponse(format!("expires_in out of range: {expires_in}"))
            })
    }
}

#[async_trait]
impl TokenExchangerTrait for TokenExchanger {
    async fn exchange(
        &self,
        assertion: &SignedAssertion,
        identity: &Identity,
    ) -> Result<AccessToken, ExchangeError> {
        Self::exchange(self, assertion, identity).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::testing::fixtures::{test_assertion, test_identity};

    async fn exchanger_for(server: &MockServer) -> TokenExchanger {
        TokenExchanger::new(format!("{}/auth/oauth2/token", server.uri()), Duration::seconds(300))
    }

    #[tokio::test]
    async fn posts_client_credentials_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=BUSINESSAPI.test-client"))
            .and(body_string_contains(
                "client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer",
            ))
            .and(body_string_contains("client_assertion=signed.jwt.value"))
            .and(body_string_contains("scope=business.api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc",
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "business.api"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = test_identity();
        let token = exchanger_for(&server)
            .await
            .exchange(&test_assertion(&identity), &identity)
            .await
            .expect("exchange should succeed");

        assert_eq!(token.access_token, "abc");
        assert_eq!(token.scope.as_deref(), Some("business.api"));
        // 3600s lifetime minus the 300s buffer.
        let remaining = token.seconds_until_expiry();
        assert!((3290..=3300).contains(&remaining), "remaining was {remaining}");
    }

    #[tokio::test]
    async fn provider_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "unknown key id"
            })))
            .mount(&server)
            .await;

        let identity = test_identity();
        let err = exchanger_for(&server)
            .await
            .exchange(&test_assertion(&identity), &identity)
            .await
            .unwrap_err();

        match err {
            ExchangeError::Provider { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body.error, "invalid_client");
                assert_eq!(body.error_description.as_deref(), Some("unknown key id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn opaque_failure_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let identity = test_identity();
        let err = exchanger_for(&server)
            .await
            .exchange(&test_assertion(&identity), &identity)
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Status { status: 503 }));
        assert_eq!(err.status(), Some(503));
    }

    async fn exchange_with_lifetime(expires_in: i64) -> Result<AccessToken, ExchangeError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc",
                "expires_in": expires_in
            })))
            .mount(&server)
            .await;

        let identity = test_identity();
        exchanger_for(&server).await.exchange(&test_assertion(&identity), &identity).await
    }

    #[tokio::test]
    async fn huge_expires_in_is_invalid_response() {
        let err = exchange_with_lifetime(100_000_000_000_000).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidResponse(ref msg) if msg.contains("out of range")));

        let err = exchange_with_lifetime(i64::MAX).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidResponse(_)));
    }

    /// A lifetime inside the 300s buffer would be stale on arrival.
    #[tokio::test]
    async fn lifetime_within_refresh_buffer_is_rejected() {
        let err = exchange_with_lifetime(300).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidResponse(ref msg) if msg.contains("refresh buffer")));

        let token = exchange_with_lifetime(301).await.expect("one usable second");
        assert!(token.is_fresh());
    }

    #[tokio::test]
    async fn malformed_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let identity = test_identity();
        let err = exchanger_for(&server)
            .await
            .exchange(&test_assertion(&identity), &identity)
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::InvalidResponse(_)));
    }
}

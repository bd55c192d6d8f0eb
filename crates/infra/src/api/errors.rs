//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use std::time::Duration;

use fleetlink_common::auth::{ExchangeError, TokenManagerError};
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (token exchange, 401, 403)
    Authentication,
    /// Throttling errors (429 and everything derived from `Retry-After`)
    RateLimit,
    /// Server errors (5xx)
    Server,
    /// Client errors (4xx except auth and 429, malformed payloads)
    Client,
    /// Network/connection errors
    Network,
    /// Configuration errors and cancellation - never retried
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] TokenManagerError),

    #[error("Rate limited by {url} without a Retry-After header")]
    MissingRetryAfter { url: String },

    #[error("Rate limited with unparseable Retry-After value '{value}'")]
    InvalidRetryAfter { value: String },

    #[error("Retry-After of {} exceeds the {} ceiling", format_secs(*wait), format_secs(*ceiling))]
    RetryAfterExceedsCeiling { wait: Duration, ceiling: Duration },

    #[error("Rate limit retries exhausted after {attempts} attempts for {url}")]
    RetriesExhausted { attempts: u32, url: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{url} returned status {status}{}", body_suffix(body))]
    Status { status: u16, url: String, body: String },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Whole seconds when exact, otherwise milliseconds rounded up.
fn format_secs(duration: Duration) -> String {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}.{:03}s", millis / 1000, millis % 1000)
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(err) if err.is_configuration() => ApiErrorCategory::Config,
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::MissingRetryAfter { .. }
            | Self::InvalidRetryAfter { .. }
            | Self::RetryAfterExceedsCeiling { .. }
            | Self::RetriesExhausted { .. } => ApiErrorCategory::RateLimit,
            Self::Status { status, .. } => match *status {
                401 | 403 => ApiErrorCategory::Authentication,
                429 => ApiErrorCategory::RateLimit,
                500..=599 => ApiErrorCategory::Server,
                _ => ApiErrorCategory::Client,
            },
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::InvalidRequest(_) | Self::Decode { .. } => ApiErrorCategory::Client,
            Self::Config(_) | Self::Cancelled => ApiErrorCategory::Config,
        }
    }

    /// Whether a caller may reasonably retry the whole operation later.
    ///
    /// A throttling response without a usable `Retry-After` is excluded, as
    /// is a token endpoint rejection: only a 5xx or transport failure there
    /// is worth another exchange.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::MissingRetryAfter { .. } | Self::InvalidRetryAfter { .. } => return false,
            Self::Auth(TokenManagerError::Exchange(ExchangeError::Transport(_))) => return true,
            Self::Auth(TokenManagerError::Exchange(err)) => {
                return err.status().is_some_and(|status| status >= 500)
            }
            _ => {}
        }
        matches!(
            self.category(),
            ApiErrorCategory::Authentication
                | ApiErrorCategory::RateLimit
                | ApiErrorCategory::Server
                | ApiErrorCategory::Network
        )
    }

    /// Server-requested delay, when one was received but not honoured.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryAfterExceedsCeiling { wait, .. } => Some(*wait),
            _ => None,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Auth(TokenManagerError::Exchange(err)) => err.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use fleetlink_common::auth::ProviderErrorBody;

    use super::*;

    fn status(code: u16) -> ApiError {
        ApiError::Status { status: code, url: "https://api.test/v1/x".into(), body: String::new() }
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(status(401).category(), ApiErrorCategory::Authentication);
        assert_eq!(status(429).category(), ApiErrorCategory::RateLimit);
        assert_eq!(status(503).category(), ApiErrorCategory::Server);
        assert_eq!(status(404).category(), ApiErrorCategory::Client);
        assert_eq!(ApiError::Network("reset".into()).category(), ApiErrorCategory::Network);
        assert_eq!(ApiError::Cancelled.category(), ApiErrorCategory::Config);
        assert_eq!(
            ApiError::RetriesExhausted { attempts: 5, url: "u".into() }.category(),
            ApiErrorCategory::RateLimit
        );
    }

    #[test]
    fn test_should_retry() {
        assert!(status(503).should_retry());
        assert!(ApiError::Network("reset".into()).should_retry());
        assert!(ApiError::RetriesExhausted { attempts: 5, url: "u".into() }.should_retry());
        assert!(!status(400).should_retry());
        assert!(!ApiError::Cancelled.should_retry());
        assert!(!ApiError::MissingRetryAfter { url: "u".into() }.should_retry());
        assert!(!ApiError::InvalidRetryAfter { value: "soon".into() }.should_retry());
    }

    #[test]
    fn test_exchange_failure_is_authentication() {
        let err: ApiError = TokenManagerError::Exchange(ExchangeError::Status { status: 401 }).into();
        assert_eq!(err.category(), ApiErrorCategory::Authentication);
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_token_endpoint_rejection_is_not_retried() {
        let rejected: ApiError = TokenManagerError::Exchange(ExchangeError::Provider {
            status: 400,
            body: ProviderErrorBody {
                error: "invalid_client".into(),
                error_description: None,
                error_uri: None,
            },
        })
        .into();
        assert_eq!(rejected.category(), ApiErrorCategory::Authentication);
        assert!(!rejected.should_retry());

        let opaque_4xx: ApiError =
            TokenManagerError::Exchange(ExchangeError::Status { status: 401 }).into();
        assert!(!opaque_4xx.should_retry());

        let malformed: ApiError =
            TokenManagerError::Exchange(ExchangeError::InvalidResponse("bad".into())).into();
        assert!(!malformed.should_retry());

        let unavailable: ApiError =
            TokenManagerError::Exchange(ExchangeError::Status { status: 503 }).into();
        assert!(unavailable.should_retry());

        assert!(status(401).should_retry());
    }

    #[test]
    fn test_fractional_wait_is_not_truncated() {
        let err = ApiError::RetryAfterExceedsCeiling {
            wait: Duration::from_millis(60_400),
            ceiling: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "Retry-After of 60.400s exceeds the 60s ceiling");

        let err = ApiError::RetryAfterExceedsCeiling {
            wait: Duration::from_nanos(60_000_000_001),
            ceiling: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "Retry-After of 60.001s exceeds the 60s ceiling");
    }

    #[test]
    fn test_messages_name_the_numbers() {
        let err = ApiError::RetryAfterExceedsCeiling {
            wait: Duration::from_secs(120),
            ceiling: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "Retry-After of 120s exceeds the 60s ceiling");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));

        let err = ApiError::RetriesExhausted { attempts: 5, url: "https://api.test".into() };
        assert!(err.to_string().contains("5 attempts"));

        assert_eq!(status(404).to_string(), "https://api.test/v1/x returned status 404");
    }
}

//! Credential types
//!
//! Defines the signed client assertion, the bearer access token, and the
//! wire formats of the token endpoint (RFC 6749 §5.1 / §5.2).

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use fleetlink_domain::Fingerprint;
use serde::{Deserialize, Serialize};

/// Self-signed JWT asserting the client's identity.
///
/// `expires_at` is the real `exp` claim. Reuse stops `refresh_buffer` before
/// it, see [`SignedAssertion::is_fresh_at`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAssertion {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
}

impl SignedAssertion {
    /// `now < expires_at - refresh_buffer`
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, refresh_buffer: Duration) -> bool {
        now < self.expires_at - refresh_buffer
    }

    #[must_use]
    pub fn is_fresh(&self, refresh_buffer: Duration) -> bool {
        self.is_fresh_at(Utc::now(), refresh_buffer)
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Bearer token issued by the token endpoint.
///
/// `expires_at` already has the refresh buffer subtracted when the token was
/// exchanged, so freshness is a plain comparison against now.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub fingerprint: Fingerprint,
}

impl AccessToken {
    /// `now < expires_at`
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Seconds until the (buffer-adjusted) expiry; negative once stale.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Freshness of an in-memory credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Missing,
    Stale,
    Fresh,
}

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error response from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderErrorBody {
    pub error: String,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl fmt::Display for ProviderErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

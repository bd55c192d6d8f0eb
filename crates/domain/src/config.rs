//! Configuration structures
//!
//! Every section except `identity` has serde defaults so a minimal file only
//! needs the credential fields.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ASSERTION_LIFETIME_SECS, CACHE_DIR_NAME, DEFAULT_API_BASE_URL, DEFAULT_ASSERTION_AUDIENCE,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRY_WAIT_SECS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS, DEFAULT_REFRESH_BUFFER_SECS,
    DEFAULT_SCOPE, DEFAULT_TOKEN_URL,
};
use crate::errors::{FleetLinkError, Result};
use crate::types::Identity;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub identity: IdentityConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Credential fields; the private key is given inline or by path.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub issuer: String,
    pub client_id: String,
    pub key_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_pem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_scope")]
    pub scope: String,
}

impl IdentityConfig {
    /// Resolve the configured key material and validate all fields.
    ///
    /// # Errors
    /// Returns `FleetLinkError::Config` if no key is configured, the key file
    /// cannot be read, or any identity field is blank.
    pub fn resolve(&self) -> Result<Identity> {
        let pem = match (&self.private_key_pem, &self.private_key_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                FleetLinkError::Config(format!(
                    "Failed to read private key {}: {}",
                    path.display(),
                    e
                ))
            })?,
            (None, None) => {
                return Err(FleetLinkError::Config(
                    "identity requires private_key_pem or private_key_path".to_string(),
                ))
            }
        };

        Identity::new(&self.issuer, &self.client_id, &self.key_id, pem, &self.scope)
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("key_id", &self.key_id)
            .field("private_key_pem", &self.private_key_pem.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint, assertion policy and cache location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_url: String,
    pub audience: String,
    pub assertion_lifetime_secs: i64,
    pub refresh_buffer_secs: i64,
    pub cache_dir: Option<PathBuf>,
    pub cache_enabled: bool,
}

impl AuthConfig {
    /// Check the credential lifetimes.
    ///
    /// Requires `0 <= refresh_buffer_secs < assertion_lifetime_secs` and an
    /// assertion lifetime no longer than 180 days.
    ///
    /// # Errors
    /// Returns `FleetLinkError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_buffer_secs < 0 {
            return Err(FleetLinkError::Config(format!(
                "auth.refresh_buffer_secs must not be negative (got {})",
                self.refresh_buffer_secs
            )));
        }
        if self.assertion_lifetime_secs <= 0 || self.assertion_lifetime_secs > ASSERTION_LIFETIME_SECS
        {
            return Err(FleetLinkError::Config(format!(
                "auth.assertion_lifetime_secs must be between 1 and {ASSERTION_LIFETIME_SECS} (got {})",
                self.assertion_lifetime_secs
            )));
        }
        if self.assertion_lifetime_secs <= self.refresh_buffer_secs {
            return Err(FleetLinkError::Config(format!(
                "auth.assertion_lifetime_secs ({}) must exceed auth.refresh_buffer_secs ({})",
                self.assertion_lifetime_secs, self.refresh_buffer_secs
            )));
        }
        Ok(())
    }

    /// Configured cache directory, or the per-user default.
    #[must_use]
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            audience: DEFAULT_ASSERTION_AUDIENCE.to_string(),
            assertion_lifetime_secs: ASSERTION_LIFETIME_SECS,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            cache_dir: None,
            cache_enabled: true,
        }
    }
}

/// Request executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Total attempts per request, the initial one included.
    pub max_attempts: u32,
    /// Longest `Retry-After` the executor is willing to sleep for.
    pub max_retry_wait_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_retry_wait_secs: DEFAULT_MAX_RETRY_WAIT_SECS,
        }
    }
}

/// Activity poller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: DEFAULT_POLL_INTERVAL_SECS, max_attempts: DEFAULT_POLL_MAX_ATTEMPTS }
    }
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

/// Per-user cache directory: `$XDG_CACHE_HOME/fleetlink`, then
/// `$HOME/.cache/fleetlink`, then the system temp directory.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(xdg) = non_empty("XDG_CACHE_HOME") {
        return xdg.join(CACHE_DIR_NAME);
    }
    if let Some(home) = non_empty("HOME") {
        return home.join(".cache").join(CACHE_DIR_NAME);
    }
    std::env::temp_dir().join(CACHE_DIR_NAME)
}

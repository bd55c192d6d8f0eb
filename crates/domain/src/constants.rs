//! Protocol constants
//!
//! Defaults for the identity provider, cache layout, retry policy and
//! activity polling. Every value here can be overridden through
//! [`crate::config::Config`].

// Identity provider
pub const DEFAULT_TOKEN_URL: &str = "https://account.apple.com/auth/oauth2/token";
pub const DEFAULT_ASSERTION_AUDIENCE: &str = "https://account.apple.com/auth/oauth2/v2/token";
pub const DEFAULT_SCOPE: &str = "business.api";
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

// Credential lifetimes
pub const ASSERTION_LIFETIME_SECS: i64 = 180 * 24 * 60 * 60;
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

// Cache layout
pub const CACHE_DIR_NAME: &str = "fleetlink";
pub const FINGERPRINT_HEX_LEN: usize = 16;
pub const ASSERTION_CACHE_PREFIX: &str = "assertion";
pub const TOKEN_CACHE_PREFIX: &str = "token";

// Request executor
pub const DEFAULT_API_BASE_URL: &str = "https://api-business.apple.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_RETRY_WAIT_SECS: u64 = 60;
pub const USER_AGENT: &str = concat!("fleetlink/", env!("CARGO_PKG_VERSION"));

// Activity polling
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;
pub const SUCCESS_SUB_STATUS: &str = "COMPLETED_WITH_SUCCESS";
pub const ACTIVITIES_PATH: &str = "/v1/orgDeviceActivities";

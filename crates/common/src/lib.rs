//! Shared runtime pieces for FleetLink crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: serde-ready types, no side effects
//! - `observability`: the injectable transport logging capability + tracing
//! - `platform`: credential signing, caching, token exchange and the token
//!   manager
//! - `test-utils`: mocks and fixtures for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Observability tier
// --------------------------------------------------------------
#[cfg(feature = "observability")]
pub mod observability;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "platform")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{
    AccessToken, AssertionSigner, CacheSeed, CredentialCacheTrait, DisabledCredentialCache,
    ExchangeError, FileCredentialCache, SignedAssertion, SigningError, TokenExchanger,
    TokenExchangerTrait, TokenManager, TokenManagerError, TokenState,
};
#[cfg(feature = "observability")]
pub use observability::{NoopTransportLogger, TracingTransportLogger, TransportLog, TransportLogger};

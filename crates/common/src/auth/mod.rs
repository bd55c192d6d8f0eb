//! Client-credentials authentication for the device-management API
//!
//! Obtains bearer tokens with the OAuth 2.0 JWT-bearer client assertion
//! flow: a long-lived ES256 assertion is minted from the organisation's
//! private key and exchanged for a short-lived access token.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TokenManager   │  Double-checked refresh, shared by all callers
//! └────────┬────────┘
//!          │
//!          ├──► AssertionSigner      (ES256 client assertion)
//!          ├──► TokenExchanger       (token endpoint POST)
//!          └──► FileCredentialCache  (per-fingerprint JSON files)
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `SignedAssertion`, `AccessToken`, token endpoint bodies
//! - **[`signer`]**: assertion claims and signing
//! - **[`exchanger`]**: token endpoint client
//! - **[`cache`]**: on-disk cache, plus a disabled variant
//! - **[`token_manager`]**: in-memory state and refresh orchestration
//! - **[`traits`]**: seams for the exchanger and cache

pub mod cache;
pub mod exchanger;
pub mod signer;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use cache::{CacheError, CachedCredential, DisabledCredentialCache, FileCredentialCache};
pub use exchanger::{ExchangeError, TokenExchanger};
pub use signer::{AssertionClaims, AssertionSigner, SigningError};
pub use token_manager::{CacheSeed, TokenManager, TokenManagerError};
pub use traits::{CredentialCacheTrait, TokenExchangerTrait};
pub use types::{AccessToken, ProviderErrorBody, SignedAssertion, TokenResponse, TokenState};

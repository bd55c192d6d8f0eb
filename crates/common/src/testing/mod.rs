//! Testing utilities and helpers
//!
//! - **[`fixtures`]**: a test EC key pair, identities, assertions and tokens
//! - **[`mocks`]**: in-memory token exchanger, credential cache and a
//!   recording transport logger
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use fleetlink_common::auth::{AssertionSigner, TokenManager};
//! use fleetlink_common::testing::{test_identity, MockCredentialCache, MockTokenExchanger};
//!
//! let manager = TokenManager::new(
//!     test_identity(),
//!     AssertionSigner::default(),
//!     MockTokenExchanger::new(),
//!     Arc::new(MockCredentialCache::new()),
//! );
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{
    test_assertion, test_identity, test_identity_with, test_token, TEST_CLIENT_ID,
    TEST_EC_PRIVATE_KEY_PEM, TEST_EC_PUBLIC_KEY_PEM, TEST_ISSUER, TEST_KEY_ID,
};
pub use mocks::{MockCredentialCache, MockTokenExchanger, RecordedEvent, RecordingTransportLogger};

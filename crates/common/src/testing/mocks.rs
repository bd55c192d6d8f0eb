//! Mock implementations of the auth and observability traits
//!
//! Provides in-memory stand-ins for the token endpoint, the credential cache
//! and the transport logger.

// Test mocks panic on poisoned mutexes; a panicking test fails anyway.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fleetlink_domain::Identity;

use crate::auth::{
    AccessToken, CachedCredential, CredentialCacheTrait, ExchangeError, SignedAssertion,
    TokenExchangerTrait,
};
use crate::observability::TransportLogger;

/// Token endpoint stand-in.
///
/// Issues `token-1`, `token-2`, ... and counts every call.
#[derive(Debug)]
pub struct MockTokenExchanger {
    calls: AtomicUsize,
    delay: Option<StdDuration>,
    lifetime: Duration,
    failure: Mutex<Option<u16>>,
    assertions: Mutex<Vec<String>>,
}

impl MockTokenExchanger {
    /// Tokens valid for one hour, no delay, no failures.
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            lifetime: Duration::hours(1),
            failure: Mutex::new(None),
            assertions: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to widen race windows.
    #[must_use]
    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Buffer-adjusted lifetime of issued tokens. Negative values produce
    /// tokens that are already stale.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Answer subsequent calls with `ExchangeError::Status`.
    pub fn fail_with_status(&self, status: Option<u16>) {
        *self.failure.lock().unwrap() = status;
    }

    /// Number of exchanges attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Assertion strings received, in order.
    pub fn assertions(&self) -> Vec<String> {
        self.assertions.lock().unwrap().clone()
    }
}

impl Default for MockTokenExchanger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenExchangerTrait for MockTokenExchanger {
    async fn exchange(
        &self,
        assertion: &SignedAssertion,
        identity: &Identity,
    ) -> Result<AccessToken, ExchangeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.assertions.lock().unwrap().push(assertion.token.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = *self.failure.lock().unwrap() {
            return Err(ExchangeError::Status { status });
        }

        Ok(AccessToken {
            access_token: format!("token-{n}"),
            token_type: "Bearer".to_string(),
            expires_at: Utc::now() + self.lifetime,
            scope: Some(identity.scope().to_string()),
            fingerprint: identity.fingerprint().clone(),
        })
    }
}

/// In-memory credential cache with the same trust rules as the file cache.
#[derive(Debug)]
pub struct MockCredentialCache {
    assertion: Mutex<Option<SignedAssertion>>,
    token: Mutex<Option<AccessToken>>,
    refresh_buffer: Duration,
    saved_assertions: AtomicUsize,
    saved_tokens: AtomicUsize,
}

impl MockCredentialCache {
    pub fn new() -> Self {
        Self {
            assertion: Mutex::new(None),
            token: Mutex::new(None),
            refresh_buffer: Duration::seconds(300),
            saved_assertions: AtomicUsize::new(0),
            saved_tokens: AtomicUsize::new(0),
        }
    }

    /// Pre-populate the token slot without counting a save.
    pub fn put_token(&self, token: AccessToken) {
        *self.token.lock().unwrap() = Some(token);
    }

    /// Pre-populate the assertion slot without counting a save.
    pub fn put_assertion(&self, assertion: SignedAssertion) {
        *self.assertion.lock().unwrap() = Some(assertion);
    }

    pub fn token(&self) -> Option<AccessToken> {
        self.token.lock().unwrap().clone()
    }

    pub fn assertion(&self) -> Option<SignedAssertion> {
        self.assertion.lock().unwrap().clone()
    }

    pub fn saved_tokens(&self) -> usize {
        self.saved_tokens.load(Ordering::SeqCst)
    }

    pub fn saved_assertions(&self) -> usize {
        self.saved_assertions.load(Ordering::SeqCst)
    }

    fn trusted<T: CachedCredential + Clone>(
        &self,
        slot: &Mutex<Option<T>>,
        identity: &Identity,
    ) -> Option<T> {
        let mut slot = slot.lock().unwrap();
        let usable = slot.as_ref().is_some_and(|value| {
            value.fingerprint() == identity.fingerprint()
                && value.is_usable_at(Utc::now(), self.refresh_buffer)
        });
        if usable {
            slot.clone()
        } else {
            *slot = None;
            None
        }
    }
}

impl Default for MockCredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialCacheTrait for MockCredentialCache {
    async fn load_assertion(&self, identity: &Identity) -> Option<SignedAssertion> {
        self.trusted(&self.assertion, identity)
    }

    async fn save_assertion(&self, _identity: &Identity, assertion: &SignedAssertion) {
        self.saved_assertions.fetch_add(1, Ordering::SeqCst);
        *self.assertion.lock().unwrap() = Some(assertion.clone());
    }

    async fn load_token(&self, identity: &Identity) -> Option<AccessToken> {
        self.trusted(&self.token, identity)
    }

    async fn save_token(&self, _identity: &Identity, token: &AccessToken) {
        self.saved_tokens.fetch_add(1, Ordering::SeqCst);
        *self.token.lock().unwrap() = Some(token.clone());
    }

    async fn remove_token(&self, _identity: &Identity) {
        *self.token.lock().unwrap() = None;
    }
}

/// A call captured by [`RecordingTransportLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Request { method: String, url: String, body: Option<Vec<u8>> },
    Response { status: u16, headers: Vec<(String, String)>, body: Vec<u8> },
    Auth { message: String, fields: Vec<(String, String)> },
}

/// Transport logger that keeps every call for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransportLogger {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingTransportLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, RecordedEvent::Request { .. }))
            .collect()
    }

    pub fn auth_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Auth { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl TransportLogger for RecordingTransportLogger {
    fn log_request(&self, method: &str, url: &str, body: Option<&[u8]>) {
        self.events.lock().unwrap().push(RecordedEvent::Request {
            method: method.to_string(),
            url: url.to_string(),
            body: body.map(<[u8]>::to_vec),
        });
    }

    fn log_response(&self, status: u16, headers: &[(String, String)], body: &[u8]) {
        self.events.lock().unwrap().push(RecordedEvent::Response {
            status,
            headers: headers.to_vec(),
            body: body.to_vec(),
        });
    }

    fn log_auth_event(&self, message: &str, fields: &[(&str, String)]) {
        self.events.lock().unwrap().push(RecordedEvent::Auth {
            message: message.to_string(),
            fields: fields.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
        });
    }
}

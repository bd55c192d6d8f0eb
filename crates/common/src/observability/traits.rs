//! Trait abstractions for transport logging
//!
//! This module defines the injectable logging capability used by the token
//! manager, token exchanger and request executor. Hosts plug in their own
//! sink (for instance a plugin framework's logger) without the core
//! depending on it.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

/// Maximum number of body bytes rendered by [`TracingTransportLogger`].
pub const BODY_PREVIEW_LIMIT: usize = 2048;

// ============================================================================
// Transport Logging Trait
// ============================================================================

/// Sink for outbound requests, inbound responses and auth lifecycle events.
///
/// All methods default to no-ops so implementations only override what they
/// care about.
pub trait TransportLogger: Send + Sync + Debug {
    /// Log an outbound request before it is sent.
    fn log_request(&self, _method: &str, _url: &str, _body: Option<&[u8]>) {}

    /// Log an inbound response after its body has been buffered.
    fn log_response(&self, _status: u16, _headers: &[(String, String)], _body: &[u8]) {}

    /// Log an authentication lifecycle event with structured fields.
    fn log_auth_event(&self, _message: &str, _fields: &[(&str, String)]) {}
}

/// Logger that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopTransportLogger;

impl TransportLogger for NoopTransportLogger {}

/// Logger that forwards to `tracing` at debug level.
#[derive(Debug, Clone, Default)]
pub struct TracingTransportLogger;

impl TransportLogger for TracingTransportLogger {
    fn log_request(&self, method: &str, url: &str, body: Option<&[u8]>) {
        let body = body.map(body_preview).unwrap_or_default();
        debug!(target: "fleetlink::transport", method, url, body = %body, "transport.request");
    }

    fn log_response(&self, status: u16, headers: &[(String, String)], body: &[u8]) {
        let headers = headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        debug!(
            target: "fleetlink::transport",
            status,
            headers = %headers,
            body = %body_preview(body),
            "transport.response"
        );
    }

    fn log_auth_event(&self, message: &str, fields: &[(&str, String)]) {
        let fields =
            fields.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        debug!(target: "fleetlink::auth", fields = %fields, "{message}");
    }
}

/// Render at most [`BODY_PREVIEW_LIMIT`] bytes of a body as lossy UTF-8.
#[must_use]
pub fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(BODY_PREVIEW_LIMIT);
    let mut preview = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > BODY_PREVIEW_LIMIT {
        preview.push_str("...");
    }
    preview
}

/// Optional logger handle; every call is a no-op when no sink is installed.
#[derive(Debug, Clone, Default)]
pub struct TransportLog(Option<Arc<dyn TransportLogger>>);

impl TransportLog {
    #[must_use]
    pub fn new(sink: Option<Arc<dyn TransportLogger>>) -> Self {
        Self(sink)
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    pub fn request(&self, method: &str, url: &str, body: Option<&[u8]>) {
        if let Some(sink) = &self.0 {
            sink.log_request(method, url, body);
        }
    }

    pub fn response(&self, status: u16, headers: &[(String, String)], body: &[u8]) {
        if let Some(sink) = &self.0 {
            sink.log_response(status, headers, body);
        }
    }

    pub fn auth_event(&self, message: &str, fields: &[(&str, String)]) {
        if let Some(sink) = &self.0 {
            sink.log_auth_event(message, fields);
        }
    }
}

impl From<Arc<dyn TransportLogger>> for TransportLog {
    fn from(sink: Arc<dyn TransportLogger>) -> Self {
        Self(Some(sink))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct CountingLogger {
        events: Mutex<Vec<String>>,
    }

    impl TransportLogger for CountingLogger {
        fn log_auth_event(&self, message: &str, _fields: &[(&str, String)]) {
            self.events.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn disabled_handle_is_noop() {
        let log = TransportLog::disabled();
        assert!(!log.is_enabled());
        log.request("GET", "https://example.test", None);
        log.response(200, &[], b"{}");
        log.auth_event("ignored", &[]);
    }

    #[test]
    fn handle_forwards_to_sink() {
        let sink = Arc::new(CountingLogger::default());
        let log = TransportLog::new(Some(sink.clone()));

        log.auth_event("token.refreshed", &[("fingerprint", "abc".to_string())]);
        log.request("GET", "https://example.test", None);

        assert_eq!(*sink.events.lock().unwrap(), vec!["token.refreshed".to_string()]);
    }

    #[test]
    fn body_preview_truncates_large_bodies() {
        let body = vec![b'a'; BODY_PREVIEW_LIMIT + 10];
        let preview = body_preview(&body);
        assert_eq!(preview.len(), BODY_PREVIEW_LIMIT + 3);
        assert!(preview.ends_with("..."));
        assert_eq!(body_preview(b"short"), "short");
    }

    #[test]
    fn noop_logger_accepts_everything() {
        let logger = NoopTransportLogger;
        logger.log_request("POST", "https://example.test", Some(b"body"));
        logger.log_response(429, &[("retry-after".into(), "1".into())], b"");
        logger.log_auth_event("event", &[]);
    }
}

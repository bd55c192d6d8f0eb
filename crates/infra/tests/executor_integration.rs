//! Integration tests for the rate-limited request executor
//!
//! Runs the executor against a wiremock API server with a real token manager
//! backed by the mock exchanger.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fleetlink_common::auth::{AssertionSigner, TokenManager};
use fleetlink_common::testing::{
    test_identity, MockCredentialCache, MockTokenExchanger, RecordedEvent, RecordingTransportLogger,
};
use fleetlink_infra::{ApiError, ApiRequest, RequestExecutor};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_manager() -> Arc<TokenManager<MockTokenExchanger, MockCredentialCache>> {
    Arc::new(TokenManager::new(
        test_identity(),
        AssertionSigner::default(),
        MockTokenExchanger::new(),
        Arc::new(MockCredentialCache::new()),
    ))
}

fn executor(server: &MockServer, ceiling: Duration) -> RequestExecutor {
    RequestExecutor::builder()
        .base_url(server.uri())
        .max_attempts(5)
        .max_retry_wait(ceiling)
        .build(token_manager())
        .expect("executor builds")
}

fn throttled(retry_after: &str) -> ResponseTemplate {
    ResponseTemplate::new(429).insert_header("retry-after", retry_after)
}

/// Validates that throttled attempts are retried until the server accepts.
///
/// # Test Steps
/// 1. Answer the first two requests with `429 Retry-After: 0`
/// 2. Answer the third with 200
/// 3. Verify success after exactly three requests
#[tokio::test]
async fn test_retries_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orgDevices"))
        .respond_with(throttled("0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/orgDevices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    let response = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.received_requests().await.expect("recording").len(), 3);
}

/// Validates that a wait above the ceiling fails without sleeping.
///
/// # Test Steps
/// 1. Answer with `429 Retry-After: 120` against a 60s ceiling
/// 2. Verify `RetryAfterExceedsCeiling` is returned promptly after one request
#[tokio::test]
async fn test_wait_above_ceiling_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(throttled("120")).mount(&server).await;

    let started = Instant::now();
    let err = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect_err("ceiling exceeded");

    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        ApiError::RetryAfterExceedsCeiling { wait, ceiling } => {
            assert_eq!(wait, Duration::from_secs(120));
            assert_eq!(ceiling, Duration::from_secs(60));
        }
        other => panic!("expected ceiling error, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.expect("recording").len(), 1);
}

/// Validates that a 429 without `Retry-After` is a hard error.
#[tokio::test]
async fn test_missing_retry_after_is_hard_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(429)).mount(&server).await;

    let err = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect_err("no retry-after");

    assert!(matches!(err, ApiError::MissingRetryAfter { .. }));
    assert!(!err.should_retry());
    assert_eq!(server.received_requests().await.expect("recording").len(), 1);
}

/// Validates that an unparseable `Retry-After` is a hard error.
#[tokio::test]
async fn test_garbled_retry_after_is_hard_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(throttled("in a bit")).mount(&server).await;

    let err = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect_err("garbled retry-after");

    assert!(matches!(err, ApiError::InvalidRetryAfter { ref value } if value == "in a bit"));
    assert_eq!(server.received_requests().await.expect("recording").len(), 1);
}

/// Validates that an HTTP-date in the past is honoured as "retry now".
#[tokio::test]
async fn test_http_date_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(throttled("Wed, 21 Oct 2015 07:28:00 GMT"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

    let response = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect("retried after date");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

/// Validates that every attempt is throttled until the budget runs out.
#[tokio::test]
async fn test_retries_exhausted_names_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(throttled("0")).expect(5).mount(&server).await;

    let err = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect_err("always throttled");

    assert!(matches!(err, ApiError::RetriesExhausted { attempts: 5, .. }));
    assert!(err.to_string().contains("5 attempts"));
}

/// Validates that cancellation interrupts the `Retry-After` sleep.
///
/// # Test Steps
/// 1. Answer with `429 Retry-After: 30`
/// 2. Cancel 100ms into the sleep
/// 3. Verify `Cancelled` arrives long before the 30s wait
#[tokio::test]
async fn test_cancellation_interrupts_sleep() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(throttled("30")).mount(&server).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, ApiError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Validates the bearer token header and that the buffered body is re-sent
/// unchanged on retry.
#[tokio::test]
async fn test_body_and_token_resent_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orgDeviceActivities"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(throttled("0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/orgDeviceActivities"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let body = serde_json::json!({"data": {"type": "orgDeviceActivities", "attributes": {}}});
    let request = ApiRequest::post_json("/v1/orgDeviceActivities", &body).expect("encodes");

    let response = executor(&server, Duration::from_secs(60))
        .execute(request, &CancellationToken::new())
        .await
        .expect("created");
    assert_eq!(response.status(), StatusCode::CREATED);

    let requests = server.received_requests().await.expect("recording");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);
    let sent: serde_json::Value = serde_json::from_slice(&requests[1].body).expect("json body");
    assert_eq!(sent, body);
}

/// Validates that the injected logger sees each request and response.
#[tokio::test]
async fn test_transport_logger_records_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(throttled("0")).up_to_n_times(1).mount(&server).await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let logger = RecordingTransportLogger::new();
    let executor = RequestExecutor::builder()
        .base_url(server.uri())
        .logger(Some(Arc::new(logger.clone())))
        .build(token_manager())
        .expect("executor builds");

    executor
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect("ok");

    assert_eq!(logger.requests().len(), 2);
    let statuses: Vec<u16> = logger
        .events()
        .into_iter()
        .filter_map(|event| match event {
            RecordedEvent::Response { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![429, 200]);
}

/// Validates that non-429 failures are returned for the caller to interpret.
#[tokio::test]
async fn test_server_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).expect(1).mount(&server).await;

    let response = executor(&server, Duration::from_secs(60))
        .execute(ApiRequest::get("/v1/orgDevices"), &CancellationToken::new())
        .await
        .expect("503 is returned");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.error_for_status().expect_err("503").status(), Some(503));
}

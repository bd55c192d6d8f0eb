//! Fully-buffered request and response values
//!
//! Bodies are held as [`Bytes`] so a request can be re-sent unchanged after a
//! throttling response.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::errors::ApiError;

/// Outbound request whose body can be replayed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ApiRequest {
    /// `url` may be absolute or relative to the executor's base URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: HeaderMap::new(), body: None }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST with a JSON body.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidRequest` if `body` cannot be serialized.
    pub fn post_json<T: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to encode JSON body: {e}")))?;

        Ok(Self::new(Method::POST, url)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(bytes))
    }

    /// Buffer an already-built reqwest request.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidRequest` for streaming bodies, which cannot
    /// be replayed.
    pub fn buffer(request: reqwest::Request) -> Result<Self, ApiError> {
        let body = match request.body() {
            None => None,
            Some(body) => Some(body.as_bytes().map(Bytes::copy_from_slice).ok_or_else(|| {
                ApiError::InvalidRequest(format!(
                    "streaming body for {} {} cannot be buffered for retry",
                    request.method(),
                    request.url()
                ))
            })?),
        };

        Ok(Self {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
            body,
        })
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Response with its body already read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, url: impl Into<String>) -> Self {
        Self { status, headers, body, url: url.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Final URL the response was received from.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns `ApiError::Decode` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::Decode { url: self.url.clone(), message: e.to_string() })
    }

    /// Turn a non-2xx response into `ApiError::Status`.
    ///
    /// # Errors
    /// Returns `ApiError::Status` carrying the body text.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ApiError::Status { status: self.status.as_u16(), url: self.url.clone(), body: self.text() })
    }

    pub(crate) fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| {
                (name.to_string(), value.to_str().unwrap_or("<binary>").to_string())
            })
            .collect()
    }
}

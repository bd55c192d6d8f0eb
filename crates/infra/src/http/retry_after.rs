//! `Retry-After` header parsing
//!
//! Accepts a non-negative integer second count or an HTTP-date. Anything
//! else is rejected; no default delay is ever assumed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::api::errors::ApiError;

/// Parse a `Retry-After` value relative to `now`.
///
/// A date already in the past yields a zero wait.
///
/// # Errors
/// Returns `ApiError::InvalidRetryAfter` for negative, fractional or
/// otherwise unparseable values.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Result<Duration, ApiError> {
    let trimmed = value.trim();
    let invalid = || ApiError::InvalidRetryAfter { value: value.to_string() };

    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid());
    }

    let at = DateTime::parse_from_rfc2822(trimmed).map_err(|_| invalid())?;
    Ok((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

/// Read and parse `Retry-After` from a throttling response.
///
/// # Errors
/// `ApiError::MissingRetryAfter` when the header is absent,
/// `ApiError::InvalidRetryAfter` when it is not valid text or not parseable.
pub fn retry_after_from_headers(
    headers: &HeaderMap,
    url: &str,
    now: DateTime<Utc>,
) -> Result<Duration, ApiError> {
    let value = headers
        .get(RETRY_AFTER)
        .ok_or_else(|| ApiError::MissingRetryAfter { url: url.to_string() })?;

    let text = value.to_str().map_err(|_| ApiError::InvalidRetryAfter {
        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })?;

    parse_retry_after(text, now)
}

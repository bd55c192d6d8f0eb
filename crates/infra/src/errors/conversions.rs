//! Conversions from infrastructure errors into domain errors.

use fleetlink_common::auth::TokenManagerError;
use fleetlink_domain::FleetLinkError;
use reqwest::Error as HttpError;

use crate::activity::PollError;
use crate::api::errors::ApiError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FleetLinkError);

impl From<InfraError> for FleetLinkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FleetLinkError> for InfraError {
    fn from(value: FleetLinkError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoFleetLinkError {
    fn into_fleetlink(self) -> FleetLinkError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            return ApiError::Timeout(err.to_string());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if err.is_connect() {
            return ApiError::Network(format!("connection failure: {err}"));
        }

        if err.is_builder() {
            return ApiError::InvalidRequest(err.to_string());
        }

        if err.is_decode() || err.is_body() {
            let url = err.url().map(ToString::to_string).unwrap_or_default();
            return ApiError::Decode { url, message: err.to_string() };
        }

        ApiError::Network(err.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(ApiError::from(value).into_fleetlink())
    }
}

/* -------------------------------------------------------------------------- */
/* TokenManagerError → FleetLinkError */
/* -------------------------------------------------------------------------- */

impl IntoFleetLinkError for TokenManagerError {
    fn into_fleetlink(self) -> FleetLinkError {
        if self.is_configuration() {
            FleetLinkError::Config(self.to_string())
        } else {
            FleetLinkError::Auth(self.to_string())
        }
    }
}

impl From<TokenManagerError> for InfraError {
    fn from(value: TokenManagerError) -> Self {
        InfraError(value.into_fleetlink())
    }
}

/* -------------------------------------------------------------------------- */
/* ApiError → FleetLinkError */
/* -------------------------------------------------------------------------- */

impl IntoFleetLinkError for ApiError {
    fn into_fleetlink(self) -> FleetLinkError {
        let message = self.to_string();

        match self {
            ApiError::Auth(err) => err.into_fleetlink(),
            ApiError::MissingRetryAfter { .. }
            | ApiError::InvalidRetryAfter { .. }
            | ApiError::RetryAfterExceedsCeiling { .. }
            | ApiError::RetriesExhausted { .. } => FleetLinkError::RateLimited(message),
            ApiError::Network(_) | ApiError::Timeout(_) => FleetLinkError::Network(message),
            ApiError::Config(_) => FleetLinkError::Config(message),
            ApiError::InvalidRequest(_) => FleetLinkError::InvalidInput(message),
            ApiError::Decode { .. } => FleetLinkError::Internal(message),
            ApiError::Status { status, .. } => match status {
                401 | 403 => FleetLinkError::Auth(message),
                400..=499 => FleetLinkError::InvalidInput(message),
                _ => FleetLinkError::Network(message),
            },
            ApiError::Cancelled => FleetLinkError::Cancelled,
        }
    }
}

impl From<ApiError> for FleetLinkError {
    fn from(value: ApiError) -> Self {
        value.into_fleetlink()
    }
}

/* -------------------------------------------------------------------------- */
/* PollError → FleetLinkError */
/* -------------------------------------------------------------------------- */

impl IntoFleetLinkError for PollError {
    fn into_fleetlink(self) -> FleetLinkError {
        match self {
            PollError::Cancelled => FleetLinkError::Cancelled,
            PollError::Fetch { source, .. } => source.into_fleetlink(),
            other => FleetLinkError::Operation(other.to_string()),
        }
    }
}

impl From<PollError> for FleetLinkError {
    fn from(value: PollError) -> Self {
        value.into_fleetlink()
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

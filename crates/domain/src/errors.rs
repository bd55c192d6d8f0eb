//! Error types used throughout FleetLink

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for FleetLink
///
/// Component crates keep their own precise error enums and convert into this
/// type at the boundary handed to the resource layer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FleetLinkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FleetLinkError {
    /// Stable label suitable for logging fields.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth(_) => "auth",
            Self::RateLimited(_) => "rate_limited",
            Self::Network(_) => "network",
            Self::Operation(_) => "operation",
            Self::InvalidInput(_) => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for FleetLink operations
pub type Result<T> = std::result::Result<T, FleetLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(FleetLinkError::Config("x".into()).label(), "config");
        assert_eq!(FleetLinkError::Cancelled.label(), "cancelled");
        assert_eq!(FleetLinkError::Operation("x".into()).label(), "operation");
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(FleetLinkError::Auth("invalid_client".into()))
            .expect("error should serialize");
        assert_eq!(json["type"], "Auth");
        assert_eq!(json["message"], "invalid_client");
    }
}

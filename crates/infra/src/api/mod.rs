//! Device-management API surface
//!
//! This module provides the authenticated API facade used by the resource
//! layer. It ties the token manager to the rate-limited request executor and
//! exposes the typed activity client the poller samples.
//!
//! # Architecture
//!
//! - [`AccessTokenProvider`] is the seam between the executor and the token
//!   manager
//! - [`ActivityClient`] decodes `orgDeviceActivities` resources
//! - [`ApiClient`] is built from configuration and owns every component

pub mod activities;
pub mod auth;
pub mod client;
pub mod errors;

pub use activities::ActivityClient;
pub use auth::AccessTokenProvider;
pub use client::ApiClient;
pub use errors::{ApiError, ApiErrorCategory};

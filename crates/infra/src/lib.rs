//! # FleetLink Infrastructure
//!
//! Impure transport code built on the shared auth runtime.
//!
//! This crate contains:
//! - The rate-limited request executor (`http`)
//! - The API facade and typed activity client (`api`)
//! - The asynchronous activity poller (`activity`)
//! - Configuration loading and tracing bootstrap
//!
//! ## Architecture
//! - Depends on `fleetlink-domain` and `fleetlink-common`
//! - Contains all network and filesystem I/O outside the credential cache

pub mod activity;
pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use activity::{ActivityOutcome, ActivityPoller, ActivityStatusSource, PollError, PollerConfig};
pub use api::{AccessTokenProvider, ActivityClient, ApiClient, ApiError, ApiErrorCategory};
pub use errors::InfraError;
pub use http::{ApiRequest, ApiResponse, RequestExecutor, RequestExecutorBuilder};
pub use observability::{init_tracing, LogFormat};

//! Authenticated, rate-limit aware HTTP execution

pub mod executor;
pub mod request;
pub mod retry_after;

pub use executor::{RequestExecutor, RequestExecutorBuilder};
pub use request::{ApiRequest, ApiResponse};
pub use retry_after::{parse_retry_after, retry_after_from_headers};

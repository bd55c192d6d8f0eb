//! Observability primitives
//!
//! The transport core never requires a logger. Components hold a
//! [`TransportLog`] handle which forwards to an optional
//! [`TransportLogger`] sink and does nothing when none is installed.

pub mod traits;

pub use traits::{
    NoopTransportLogger, TracingTransportLogger, TransportLog, TransportLogger, BODY_PREVIEW_LIMIT,
};

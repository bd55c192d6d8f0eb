//! # FleetLink Domain
//!
//! Domain types shared by every FleetLink crate.
//!
//! This crate contains:
//! - Credential identity and its cache fingerprint
//! - Remote activity (asynchronous operation) types
//! - Configuration structures
//! - Domain error types and Result definitions
//! - Protocol constants
//!
//! ## Architecture
//! - No dependencies on other FleetLink crates
//! - No I/O apart from reading a configured private key file
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

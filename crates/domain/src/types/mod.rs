//! Domain types and models

pub mod activity;
pub mod identity;

pub use activity::{Activity, ActivityStatus};
pub use identity::{Fingerprint, Identity};

//! Asynchronous activity polling
//!
//! Mutating API calls return an activity id. [`ActivityPoller`] samples the
//! activity through an [`ActivityStatusSource`] until the remote side reports
//! a terminal status, the attempt budget runs out, or the caller cancels.

pub mod poller;

pub use poller::{ActivityOutcome, ActivityPoller, ActivityStatusSource, PollError, PollerConfig};

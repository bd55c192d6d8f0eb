use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetlink_domain::constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS};
use fleetlink_domain::{Activity, ActivityStatus, PollingConfig};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::errors::ApiError;

/// Source of activity snapshots sampled by [`ActivityPoller`].
#[async_trait]
pub trait ActivityStatusSource: Send + Sync {
    async fn fetch_activity(
        &self,
        activity_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Activity, ApiError>;
}

/// Errors from waiting on an activity.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("activity {id} failed: {}", sub_status.as_deref().unwrap_or("no sub-status"))]
    Failed { id: String, sub_status: Option<String> },

    #[error("activity {id} was stopped: {}", sub_status.as_deref().unwrap_or("no sub-status"))]
    Stopped { id: String, sub_status: Option<String> },

    #[error("activity {id} did not finish after {attempts} attempts")]
    Timeout { id: String, attempts: u32 },

    #[error("activity {id} reported unknown status '{status}'")]
    UnknownStatus { id: String, status: String },

    #[error("waiting for activity cancelled")]
    Cancelled,

    #[error("failed to fetch activity {id}: {source}")]
    Fetch {
        id: String,
        #[source]
        source: ApiError,
    },
}

impl PollError {
    /// Remote sub-status for failed or stopped activities.
    pub fn sub_status(&self) -> Option<&str> {
        match self {
            Self::Failed { sub_status, .. } | Self::Stopped { sub_status, .. } => {
                sub_status.as_deref()
            }
            _ => None,
        }
    }
}

/// Completed activity plus a warning when it did not complete cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityOutcome {
    pub activity: Activity,
    pub warning: Option<String>,
}

impl ActivityOutcome {
    fn from_completed(activity: Activity) -> Self {
        let warning = (!activity.completed_cleanly()).then(|| {
            format!(
                "activity {} completed with sub-status {}",
                activity.id,
                activity.sub_status.as_deref().unwrap_or_default()
            )
        });
        Self { activity, warning }
    }
}

/// Poller timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay before every status query, the first one included.
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl From<&PollingConfig> for PollerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self { interval: Duration::from_secs(config.interval_secs), max_attempts: config.max_attempts }
    }
}

/// Samples an activity until it reaches a terminal status.
#[derive(Clone)]
pub struct ActivityPoller {
    source: Arc<dyn ActivityStatusSource>,
    config: PollerConfig,
}

impl ActivityPoller {
    pub fn new(source: Arc<dyn ActivityStatusSource>, config: PollerConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Wait for `activity_id` to finish.
    ///
    /// `COMPLETED` returns the activity, with a warning if its sub-status is
    /// not the success one. `FAILED` and `STOPPED` are errors carrying the
    /// sub-status, as is any unrecognised status. `IN_PROGRESS` keeps polling
    /// until `max_attempts` queries have been made.
    pub async fn await_activity(
        &self,
        activity_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ActivityOutcome, PollError> {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            let activity = match self.source.fetch_activity(activity_id, cancel).await {
                Ok(activity) => activity,
                Err(ApiError::Cancelled) => return Err(PollError::Cancelled),
                Err(source) => {
                    return Err(PollError::Fetch { id: activity_id.to_string(), source });
                }
            };

            debug!(activity_id, attempt, status = %activity.status, "poller.sampled");

            match activity.status {
                ActivityStatus::InProgress => continue,
                ActivityStatus::Completed => {
                    let outcome = ActivityOutcome::from_completed(activity);
                    match &outcome.warning {
                        Some(warning) => {
                            warn!(activity_id, attempt, %warning, "poller.completed_with_warning");
                        }
                        None => info!(activity_id, attempt, "poller.completed"),
                    }
                    return Ok(outcome);
                }
                ActivityStatus::Failed => {
                    warn!(activity_id, sub_status = ?activity.sub_status, "poller.failed");
                    return Err(PollError::Failed {
                        id: activity.id,
                        sub_status: activity.sub_status,
                    });
                }
                ActivityStatus::Stopped => {
                    warn!(activity_id, sub_status = ?activity.sub_status, "poller.stopped");
                    return Err(PollError::Stopped {
                        id: activity.id,
                        sub_status: activity.sub_status,
                    });
                }
                ActivityStatus::Unknown(status) => {
                    warn!(activity_id, %status, "poller.unknown_status");
                    return Err(PollError::UnknownStatus { id: activity.id, status });
                }
            }
        }

        warn!(activity_id, attempts, "poller.timed_out");
        Err(PollError::Timeout { id: activity_id.to_string(), attempts })
    }
}

//! Remote asynchronous operations ("activities")
//!
//! The remote system owns the activity state machine; clients only sample
//! it. [`ActivityStatus`] therefore models nothing beyond the
//! terminal/non-terminal split plus a catch-all for values this client does
//! not recognise.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SUCCESS_SUB_STATUS;

/// Status reported for an activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityStatus {
    InProgress,
    Completed,
    Failed,
    Stopped,
    /// Any value not listed above, kept verbatim.
    Unknown(String),
}

impl ActivityStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
            Self::Unknown(raw) => raw,
        }
    }

    /// `COMPLETED`, `FAILED` and `STOPPED` end polling.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl From<String> for ActivityStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "STOPPED" => Self::Stopped,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for ActivityStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ActivityStatus> for String {
    fn from(value: ActivityStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a remote activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_status: Option<String>,
    #[serde(default, rename = "createdDateTime", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "completedDateTime", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Reference to the downloadable result, when the activity produces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl Activity {
    /// Whether a completed activity carries the plain success sub-status.
    ///
    /// A missing sub-status counts as success.
    #[must_use]
    pub fn completed_cleanly(&self) -> bool {
        self.sub_status.as_deref().map_or(true, |s| s == SUCCESS_SUB_STATUS)
    }
}

//! Typed client for the device activity endpoint

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetlink_domain::constants::ACTIVITIES_PATH;
use fleetlink_domain::{Activity, ActivityStatus};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::errors::ApiError;
use crate::activity::ActivityStatusSource;
use crate::http::{ApiRequest, RequestExecutor};

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Resource,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Attributes {
    status: Option<String>,
    sub_status: Option<String>,
    created_date_time: Option<DateTime<Utc>>,
    completed_date_time: Option<DateTime<Utc>>,
    download_url: Option<String>,
}

impl From<Resource> for Activity {
    fn from(resource: Resource) -> Self {
        let attributes = resource.attributes;
        Self {
            id: resource.id,
            status: ActivityStatus::from(attributes.status.unwrap_or_default()),
            sub_status: attributes.sub_status,
            created_at: attributes.created_date_time,
            completed_at: attributes.completed_date_time,
            download_url: attributes.download_url,
        }
    }
}

/// Fetches activity snapshots through the request executor.
#[derive(Debug, Clone)]
pub struct ActivityClient {
    executor: Arc<RequestExecutor>,
}

impl ActivityClient {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// `GET {base}/v1/orgDeviceActivities/{id}`
    ///
    /// # Errors
    /// `ApiError::Status` for non-2xx responses, `ApiError::Decode` for an
    /// unexpected body, plus anything the executor returns.
    pub async fn get_activity(
        &self,
        activity_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Activity, ApiError> {
        validate_activity_id(activity_id)?;

        let request = ApiRequest::get(format!("{ACTIVITIES_PATH}/{activity_id}"));
        let response = self.executor.execute(request, cancel).await?.error_for_status()?;
        let envelope: Envelope = response.json()?;

        Ok(envelope.data.into())
    }
}

/// Ids are spliced into the request path, so only RFC 3986 unreserved
/// characters are accepted and the dot segments are refused.
fn validate_activity_id(activity_id: &str) -> Result<(), ApiError> {
    if activity_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("activity id must not be empty".into()));
    }
    let unreserved =
        |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
    if activity_id == "." || activity_id == ".." || !activity_id.chars().all(unreserved) {
        return Err(ApiError::InvalidRequest(format!("invalid activity id '{activity_id}'")));
    }
    Ok(())
}

#[async_trait]
impl ActivityStatusSource for ActivityClient {
    async fn fetch_activity(
        &self,
        activity_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Activity, ApiError> {
        self.get_activity(activity_id, cancel).await
    }
}

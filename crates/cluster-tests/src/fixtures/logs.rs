//! CloudWatch Logs client fixture for log delivery and encryption checks.

use crate::aws::{AwsCli, AwsError};
use crate::eventual::{eventually, ConsistencyCategory};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Log group as returned by `describe-log-groups`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroup {
    pub log_group_name: String,
    #[serde(default)]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub retention_in_days: Option<u32>,
}

/// A single event returned by `get-log-events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub timestamp: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct InputLogEvent<'a> {
    timestamp: i64,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogGroupsResponse {
    #[serde(default)]
    log_groups: Vec<LogGroup>,
}

#[derive(Debug, Deserialize)]
struct GetLogEventsResponse {
    #[serde(default)]
    events: Vec<LogEvent>,
}

/// Client for the CloudWatch Logs API.
#[derive(Debug, Clone)]
pub struct CloudWatchLogsClient {
    aws: AwsCli,
}

impl CloudWatchLogsClient {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }

    /// Create a log stream; an existing stream is not an error.
    pub async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), AwsError> {
        let result = self
            .aws
            .call_unit(
                "logs",
                "create-log-stream",
                &["--log-group-name", group, "--log-stream-name", stream],
            )
            .await;

        match result {
            Err(e) if e.is_code("ResourceAlreadyExistsException") => Ok(()),
            other => other,
        }
    }

    /// Put one event stamped with the current time.
    pub async fn put_log_event(
        &self,
        group: &str,
        stream: &str,
        message: &str,
    ) -> Result<(), AwsError> {
        let events = serde_json::to_string(&[InputLogEvent {
            timestamp: chrono::Utc::now().timestamp_millis(),
            message,
        }])
        .map_err(|e| AwsError::Unexpected(format!("Failed to encode log event: {e}")))?;

        self.aws
            .call_unit(
                "logs",
                "put-log-events",
                &[
                    "--log-group-name",
                    group,
                    "--log-stream-name",
                    stream,
                    "--log-events",
                    &events,
                ],
            )
            .await
    }

    /// Messages of a stream, oldest first.
    pub async fn get_log_messages(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<Vec<String>, AwsError> {
        let response: GetLogEventsResponse = self
            .aws
            .call(
                "logs",
                "get-log-events",
                &[
                    "--log-group-name",
                    group,
                    "--log-stream-name",
                    stream,
                    "--start-from-head",
                ],
            )
            .await?;

        Ok(response
            .events
            .into_iter()
            .map(|event| event.message)
            .collect())
    }

    /// Wait until a message shows up in a stream.
    pub async fn wait_for_message(
        &self,
        group: &str,
        stream: &str,
        message: &str,
    ) -> Result<(), String> {
        eventually(ConsistencyCategory::LogDelivery, || async move {
            match self.get_log_messages(group, stream).await {
                Ok(messages) => messages.iter().any(|m| m == message).then_some(()),
                Err(e) => {
                    debug!(
                        target: "cluster_tests::fixtures::logs",
                        group,
                        stream,
                        error = %e,
                        "get-log-events failed, retrying"
                    );
                    None
                }
            }
        })
        .await
    }

    /// Describe a log group by exact name.
    pub async fn describe_log_group(&self, name: &str) -> Result<Option<LogGroup>, AwsError> {
        let response: DescribeLogGroupsResponse = self
            .aws
            .call(
                "logs",
                "describe-log-groups",
                &["--log-group-name-prefix", name],
            )
            .await?;

        Ok(find_exact(response.log_groups, name))
    }
}

/// Prefix queries also match `/name-suffix` groups; keep only the exact one.
fn find_exact(groups: Vec<LogGroup>, name: &str) -> Option<LogGroup> {
    groups.into_iter().find(|group| group.log_group_name == name)
}

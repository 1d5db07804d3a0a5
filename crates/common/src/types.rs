//! AWS resource types shared across fixtures.

use serde::Deserialize;
use std::fmt;

/// Status of an Auto Scaling instance refresh.
///
/// Statuses AWS adds later are kept verbatim in `Other` and treated as
/// still running, so the poller's timeout bounds them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RefreshStatus {
    Pending,
    InProgress,
    Successful,
    Failed,
    Cancelling,
    Cancelled,
    RollbackInProgress,
    RollbackFailed,
    RollbackSuccessful,
    Baking,
    Other(String),
}

impl RefreshStatus {
    /// Whether AWS will no longer change this refresh.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefreshStatus::Successful
                | RefreshStatus::Failed
                | RefreshStatus::Cancelled
                | RefreshStatus::RollbackFailed
                | RefreshStatus::RollbackSuccessful
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            RefreshStatus::Pending => "Pending",
            RefreshStatus::InProgress => "InProgress",
            RefreshStatus::Successful => "Successful",
            RefreshStatus::Failed => "Failed",
            RefreshStatus::Cancelling => "Cancelling",
            RefreshStatus::Cancelled => "Cancelled",
            RefreshStatus::RollbackInProgress => "RollbackInProgress",
            RefreshStatus::RollbackFailed => "RollbackFailed",
            RefreshStatus::RollbackSuccessful => "RollbackSuccessful",
            RefreshStatus::Baking => "Baking",
            RefreshStatus::Other(other) => other,
        }
    }
}

impl From<String> for RefreshStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => RefreshStatus::Pending,
            "InProgress" => RefreshStatus::InProgress,
            "Successful" => RefreshStatus::Successful,
            "Failed" => RefreshStatus::Failed,
            "Cancelling" => RefreshStatus::Cancelling,
            "Cancelled" => RefreshStatus::Cancelled,
            "RollbackInProgress" => RefreshStatus::RollbackInProgress,
            "RollbackFailed" => RefreshStatus::RollbackFailed,
            "RollbackSuccessful" => RefreshStatus::RollbackSuccessful,
            "Baking" => RefreshStatus::Baking,
            _ => RefreshStatus::Other(value),
        }
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `describe-instance-refreshes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceRefresh {
    pub instance_refresh_id: String,
    #[serde(default)]
    pub auto_scaling_group_name: String,
    pub status: RefreshStatus,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub percentage_complete: Option<u32>,
}

impl InstanceRefresh {
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        let terminal = [
            "Successful",
            "Failed",
            "Cancelled",
            "RollbackFailed",
            "RollbackSuccessful",
        ];
        let running = [
            "Pending",
            "InProgress",
            "Cancelling",
            "RollbackInProgress",
            "Baking",
        ];

        for status in terminal {
            assert!(
                RefreshStatus::from(status.to_string()).is_terminal(),
                "{status} should be terminal"
            );
        }
        for status in running {
            assert!(
                !RefreshStatus::from(status.to_string()).is_terminal(),
                "{status} should not be terminal"
            );
        }
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status = RefreshStatus::from("Paused".to_string());
        assert_eq!(status, RefreshStatus::Other("Paused".to_string()));
        assert!(!status.is_terminal());
        assert_eq!(status.to_string(), "Paused");
    }

    #[test]
    fn test_deserialize_cli_entry() {
        let json = r#"{
            "InstanceRefreshId": "08b91cf7-8fa6-48af-b6a6-d227f40f1b9b",
            "AutoScalingGroupName": "elastic-master",
            "Status": "InProgress",
            "StatusReason": "Waiting for instances to warm up",
            "StartTime": "2026-10-19T10:00:00+00:00",
            "PercentageComplete": 50,
            "InstancesToUpdate": 1
        }"#;

        let refresh: InstanceRefresh = serde_json::from_str(json).expect("deserialize");
        assert_eq!(
            refresh.instance_refresh_id,
            "08b91cf7-8fa6-48af-b6a6-d227f40f1b9b"
        );
        assert_eq!(refresh.auto_scaling_group_name, "elastic-master");
        assert_eq!(refresh.status, RefreshStatus::InProgress);
        assert_eq!(refresh.percentage_complete, Some(50));
        assert!(refresh.is_in_progress());
    }
}

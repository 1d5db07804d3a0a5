//! Auto Scaling client fixture.

use crate::aws::{AwsCli, AwsError};
use crate::refresh::InstanceRefreshApi;
use common::types::InstanceRefresh;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstanceRefreshesResponse {
    #[serde(default)]
    instance_refreshes: Vec<InstanceRefresh>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartInstanceRefreshResponse {
    instance_refresh_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAutoScalingGroupsResponse {
    #[serde(default)]
    auto_scaling_groups: Vec<AutoScalingGroup>,
}

/// The parts of an Auto Scaling group the probes look at.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoScalingGroup {
    pub auto_scaling_group_name: String,
    pub desired_capacity: u32,
    #[serde(default)]
    pub instances: Vec<GroupInstance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupInstance {
    pub instance_id: String,
    pub lifecycle_state: String,
    pub health_status: String,
}

impl GroupInstance {
    pub fn is_in_service(&self) -> bool {
        self.lifecycle_state == "InService"
    }
}

/// Client for the Auto Scaling API.
#[derive(Debug, Clone)]
pub struct AutoscalingClient {
    aws: AwsCli,
}

impl AutoscalingClient {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }

    pub async fn describe_group(&self, asg_name: &str) -> Result<AutoScalingGroup, AwsError> {
        let response: DescribeAutoScalingGroupsResponse = self
            .aws
            .call(
                "autoscaling",
                "describe-auto-scaling-groups",
                &["--auto-scaling-group-names", asg_name],
            )
            .await?;

        response
            .auto_scaling_groups
            .into_iter()
            .find(|group| group.auto_scaling_group_name == asg_name)
            .ok_or_else(|| AwsError::Unexpected(format!("Auto Scaling group {asg_name} not found")))
    }

    /// Ids of the group's `InService` instances.
    pub async fn in_service_instance_ids(&self, asg_name: &str) -> Result<Vec<String>, AwsError> {
        let group = self.describe_group(asg_name).await?;
        Ok(group
            .instances
            .into_iter()
            .filter(GroupInstance::is_in_service)
            .map(|instance| instance.instance_id)
            .collect())
    }
}

#[async_trait::async_trait]
impl InstanceRefreshApi for AutoscalingClient {
    async fn describe_instance_refreshes(
        &self,
        asg_name: &str,
    ) -> Result<Vec<InstanceRefresh>, AwsError> {
        let response: DescribeInstanceRefreshesResponse = self
            .aws
            .call(
                "autoscaling",
                "describe-instance-refreshes",
                &["--auto-scaling-group-name", asg_name],
            )
            .await?;
        Ok(response.instance_refreshes)
    }

    async fn start_instance_refresh(&self, asg_name: &str) -> Result<String, AwsError> {
        let response: StartInstanceRefreshResponse = self
            .aws
            .call(
                "autoscaling",
                "start-instance-refresh",
                &["--auto-scaling-group-name", asg_name],
            )
            .await?;
        Ok(response.instance_refresh_id)
    }
}

//! Route53 client fixture.

use crate::aws::{AwsCli, AwsError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetHostedZoneResponse {
    hosted_zone: HostedZone,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListResourceRecordSetsResponse {
    #[serde(default)]
    resource_record_sets: Vec<RecordSet>,
}

/// Strip the trailing dot Route53 puts on names.
pub fn normalize_name(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Client for the Route53 API.
#[derive(Debug, Clone)]
pub struct Route53Client {
    aws: AwsCli,
}

impl Route53Client {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }

    pub async fn hosted_zone(&self, zone_id: &str) -> Result<HostedZone, AwsError> {
        let response: GetHostedZoneResponse = self
            .aws
            .call("route53", "get-hosted-zone", &["--id", zone_id])
            .await?;
        Ok(response.hosted_zone)
    }

    /// All record sets of a zone; the CLI follows pagination itself.
    pub async fn record_sets(&self, zone_id: &str) -> Result<Vec<RecordSet>, AwsError> {
        let response: ListResourceRecordSetsResponse = self
            .aws
            .call(
                "route53",
                "list-resource-record-sets",
                &["--hosted-zone-id", zone_id],
            )
            .await?;
        Ok(response.resource_record_sets)
    }

    /// Whether the zone has a record of any type with this name.
    pub async fn has_record(&self, zone_id: &str, name: &str) -> Result<bool, AwsError> {
        let wanted = normalize_name(name);
        Ok(self
            .record_sets(zone_id)
            .await?
            .iter()
            .any(|record| normalize_name(&record.name) == wanted))
    }
}

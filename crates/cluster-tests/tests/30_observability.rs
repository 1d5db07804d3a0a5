//! P1 Observability Tests
//!
//! Validates that the cluster's CloudWatch log group accepts and returns
//! events, that it is encrypted with an enabled KMS key, and that the
//! Elasticsearch service is running on the master instances.

#![cfg(feature = "observability")]

use cluster_tests::context::{ProvisionedCluster, TestContext};
use cluster_tests::fixtures::remote::failing_instances;
use serial_test::serial;

const ROOT: &str = "test_module";

async fn cluster() -> (TestContext, ProvisionedCluster) {
    let ctx = TestContext::from_env()
        .await
        .expect("Failed to build test context - check TEST_ZONE_NAME and AWS credentials");
    let provisioned = ctx
        .provision_cluster(ROOT, None)
        .expect("Cluster should bootstrap and scale out");
    (ctx, provisioned)
}

#[tokio::test]
#[serial]
async fn test_log_event_delivery() {
    let (ctx, provisioned) = cluster().await;
    let logs = ctx.logs();

    let group = provisioned
        .cluster
        .log_group_name()
        .expect("cloudwatch_log_group output");
    let stream = format!("cluster-tests-{}", uuid::Uuid::new_v4());
    let message = format!("probe {}", uuid::Uuid::new_v4());

    logs.create_log_stream(&group, &stream)
        .await
        .expect("Log stream should be created");
    logs.put_log_event(&group, &stream, &message)
        .await
        .expect("Log event should be accepted");

    logs.wait_for_message(&group, &stream, &message)
        .await
        .expect("Log event should be readable back from the stream");
}

#[tokio::test]
#[serial]
async fn test_log_group_is_kms_encrypted() {
    let (ctx, provisioned) = cluster().await;

    let group_name = provisioned
        .cluster
        .log_group_name()
        .expect("cloudwatch_log_group output");
    let group = ctx
        .logs()
        .describe_log_group(&group_name)
        .await
        .expect("describe-log-groups should succeed")
        .unwrap_or_else(|| panic!("Log group {} should exist", group_name));

    let key_id = group
        .kms_key_id
        .unwrap_or_else(|| panic!("Log group {} should have a KMS key", group_name));

    let key = ctx
        .kms()
        .describe_key(&key_id)
        .await
        .expect("KMS key should be describable");
    assert!(
        key.is_enabled(),
        "KMS key {} should be enabled, state is {}",
        key.key_id,
        key.key_state
    );
}

#[tokio::test]
#[serial]
async fn test_elasticsearch_running_on_masters() {
    let (ctx, provisioned) = cluster().await;

    let master_asg = provisioned
        .cluster
        .master_asg_name()
        .expect("master_asg_name output");
    let instances = ctx
        .autoscaling()
        .in_service_instance_ids(&master_asg)
        .await
        .expect("Master group should be describable");
    assert!(!instances.is_empty(), "No in-service master instances");

    let failures = failing_instances(
        &ctx.remote(),
        &instances,
        "systemctl is-active elasticsearch",
    )
    .await
    .expect("SSM commands should complete");

    assert!(
        failures.is_empty(),
        "elasticsearch is not active on: {:?}",
        failures
    );
}

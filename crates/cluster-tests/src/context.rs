//! Test context shared by the integration tests.
//!
//! `TestContext` loads configuration, checks that the Terraform and AWS CLIs
//! are usable, and hands out the clients the probes need.

use crate::aws::{AwsCli, AwsError};
use crate::bootstrap::{
    bootstrap_cluster, cluster_root, BootstrapError, BootstrappedCluster, ClusterModule,
    ClusterVars,
};
use crate::fixtures::{
    AutoscalingClient, CloudWatchLogsClient, DnsZone, KmsClient, Route53Client, ServiceNetwork,
    SsmExecutor,
};
use crate::logging;
use crate::refresh::RefreshPolicy;
use crate::terraform::{Terraform, TerraformError};
use common::config::{ConfigError, TestConfig};
use thiserror::Error;
use tracing::info;

/// Test context errors.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Invalid test configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Terraform is not usable: {0}")]
    Terraform(#[from] TerraformError),

    #[error("AWS CLI is not usable: {0}")]
    Aws(#[from] AwsError),

    #[error("Cluster provisioning failed: {0}")]
    Bootstrap(#[from] BootstrapError),
}

/// Configuration plus ready-to-use Terraform and AWS CLI handles.
#[derive(Debug)]
pub struct TestContext {
    config: TestConfig,
    terraform: Terraform,
    terraform_version: String,
    aws: AwsCli,
}

impl TestContext {
    /// Build a context from the process environment.
    pub async fn from_env() -> Result<Self, ContextError> {
        logging::init();
        let config = TestConfig::from_env()?;
        Self::new(config).await
    }

    /// Build a context from an already loaded configuration.
    ///
    /// Fails early when the Terraform binary cannot report its version or
    /// the test role cannot be assumed.
    pub async fn new(config: TestConfig) -> Result<Self, ContextError> {
        let terraform = Terraform::new(&config.terraform_binary)
            .with_trace(config.trace_terraform)
            .with_env("TF_IN_AUTOMATION", "1");
        let terraform_version = terraform.version()?;

        let aws = AwsCli::connect(&config).await?;

        info!(
            target: "cluster_tests::context",
            terraform_version = %terraform_version,
            region = %config.region,
            destroy_after = config.destroy_after(),
            "Test context ready"
        );

        Ok(Self {
            config,
            terraform,
            terraform_version,
            aws,
        })
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn terraform(&self) -> &Terraform {
        &self.terraform
    }

    pub fn terraform_version(&self) -> &str {
        &self.terraform_version
    }

    pub fn aws(&self) -> &AwsCli {
        &self.aws
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy::from(&self.config)
    }

    pub fn autoscaling(&self) -> AutoscalingClient {
        AutoscalingClient::new(self.aws.clone())
    }

    pub fn logs(&self) -> CloudWatchLogsClient {
        CloudWatchLogsClient::new(self.aws.clone())
    }

    pub fn kms(&self) -> KmsClient {
        KmsClient::new(self.aws.clone())
    }

    pub fn route53(&self) -> Route53Client {
        Route53Client::new(self.aws.clone())
    }

    pub fn remote(&self) -> SsmExecutor {
        SsmExecutor::new(self.aws.clone())
    }

    /// Apply the prerequisites, then bootstrap and scale out a cluster root.
    pub fn provision_cluster(
        &self,
        root_name: &str,
        environment: Option<&str>,
    ) -> Result<ProvisionedCluster, ContextError> {
        let network = ServiceNetwork::apply(&self.terraform, &self.config)?;
        let dns = DnsZone::apply(&self.terraform, &self.config)?;

        let mut vars = ClusterVars::from_fixtures(&self.config, &network, &dns)?;
        if let Some(environment) = environment {
            vars = vars.with_environment(environment);
        }

        let bootstrapped = bootstrap_cluster(
            &self.terraform,
            cluster_root(&self.config, root_name),
            vars,
            self.config.destroy_after(),
        )?;
        let cluster = bootstrapped.scale_out()?;

        Ok(ProvisionedCluster {
            cluster,
            bootstrapped,
            dns,
            network,
        })
    }
}

/// A scaled-out cluster together with the fixtures it was built on.
///
/// Fields drop in declaration order, so teardown runs cluster first and the
/// network last.
#[derive(Debug)]
pub struct ProvisionedCluster {
    pub cluster: ClusterModule,
    pub bootstrapped: BootstrappedCluster,
    pub dns: DnsZone,
    pub network: ServiceNetwork,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTerraform, FAKE_VERSION};
    use serial_test::serial;
    use std::collections::HashMap;

    fn config(fake: &FakeTerraform, root: &std::path::Path) -> TestConfig {
        let vars = HashMap::from([
            ("TEST_ZONE_NAME".to_string(), "ci.example.com".to_string()),
            (
                "TERRAFORM_BINARY".to_string(),
                fake.binary().to_string_lossy().into_owned(),
            ),
            (
                "TERRAFORM_ROOT_DIR".to_string(),
                root.to_string_lossy().into_owned(),
            ),
        ]);
        TestConfig::from_vars(&vars).expect("config")
    }

    #[tokio::test]
    #[serial]
    async fn test_context_without_role_skips_aws() {
        let fake = FakeTerraform::new();
        let root = fake.module_dir("roots");

        let ctx = TestContext::new(config(&fake, &root))
            .await
            .expect("context");

        assert_eq!(ctx.terraform_version(), FAKE_VERSION);
        assert!(ctx.aws().credentials().is_none());
        assert_eq!(ctx.aws().region(), "us-west-2");
        assert_eq!(ctx.refresh_policy(), RefreshPolicy::default());
    }

    #[tokio::test]
    async fn test_context_reports_missing_terraform() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vars = HashMap::from([
            ("TEST_ZONE_NAME".to_string(), "ci.example.com".to_string()),
            (
                "TERRAFORM_BINARY".to_string(),
                dir.path().join("missing").to_string_lossy().into_owned(),
            ),
        ]);
        let config = TestConfig::from_vars(&vars).expect("config");

        let err = TestContext::new(config).await.expect_err("should fail");
        assert!(matches!(err, ContextError::Terraform(_)));
    }
}

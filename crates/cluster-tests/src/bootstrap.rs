//! Two-phase cluster bootstrap.
//!
//! An Elasticsearch cluster cannot form quorum from nothing, so the module is
//! applied twice: first with `bootstrap_mode = true` on a single backend
//! subnet, which brings up one master that elects itself, then with
//! `bootstrap_mode = false` on the full subnet set to add the remaining master
//! and data nodes.
//!
//! A `.bootstrapped` sentinel in the root module directory records that the
//! first phase already ran, so a kept cluster is not re-bootstrapped on the
//! next run. The sentinel is written only after a successful bootstrap apply.
//! If a previous run was interrupted after the apply but before scale-out, a
//! stale sentinel can still point at a half-built cluster; delete it by hand
//! in that case.

use crate::fixtures::network::{DnsZone, ServiceNetwork};
use crate::terraform::{AppliedModule, Terraform, TerraformError, TerraformOutputs};
use crate::tfvars::Tfvars;
use common::config::TestConfig;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Sentinel marking a completed bootstrap phase.
pub const BOOTSTRAP_FLAG_FILE: &str = ".bootstrapped";

/// Bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Terraform failed: {0}")]
    Terraform(#[from] TerraformError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Service network has no private subnets to bootstrap on")]
    NoBackendSubnets,
}

/// Variables of the cluster test roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterVars {
    pub region: String,
    pub role_arn: Option<String>,
    pub elastic_zone_id: String,
    pub environment: Option<String>,
    pub lb_subnet_ids: Vec<String>,
    pub backend_subnet_ids: Vec<String>,
    pub internet_gateway_id: String,
}

impl ClusterVars {
    /// Build cluster variables from the network and DNS fixtures.
    pub fn from_fixtures(
        config: &TestConfig,
        network: &ServiceNetwork,
        dns: &DnsZone,
    ) -> Result<Self, TerraformError> {
        Ok(Self {
            region: config.region.clone(),
            role_arn: config.test_role_arn.clone(),
            elastic_zone_id: dns.subzone_id()?,
            environment: None,
            lb_subnet_ids: network.subnet_public_ids()?,
            backend_subnet_ids: network.subnet_private_ids()?,
            internet_gateway_id: network.internet_gateway_id()?,
        })
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Variables for one phase.
    ///
    /// The bootstrap phase places the single master on the first backend subnet.
    pub fn tfvars(&self, bootstrap_mode: bool) -> Result<Tfvars, BootstrapError> {
        let backend_subnet_ids = if bootstrap_mode {
            let first = self
                .backend_subnet_ids
                .first()
                .ok_or(BootstrapError::NoBackendSubnets)?;
            vec![first.clone()]
        } else {
            self.backend_subnet_ids.clone()
        };

        Ok(Tfvars::new()
            .set("region", self.region.as_str())
            .set("elastic_zone_id", self.elastic_zone_id.as_str())
            .set("bootstrap_mode", bootstrap_mode)
            .set_opt("environment", self.environment.as_deref())
            .set("lb_subnet_ids", self.lb_subnet_ids.as_slice())
            .set("backend_subnet_ids", backend_subnet_ids)
            .set("internet_gateway_id", self.internet_gateway_id.as_str())
            .set_opt("role_arn", self.role_arn.as_deref()))
    }

    fn write_tfvars(&self, module_dir: &Path, bootstrap_mode: bool) -> Result<(), BootstrapError> {
        self.tfvars(bootstrap_mode)?
            .write(module_dir)
            .map_err(|source| BootstrapError::Io {
                path: module_dir.to_path_buf(),
                source,
            })?;
        Ok(())
    }
}

/// A cluster root whose bootstrap phase has completed.
///
/// Dropping it destroys the bootstrap apply, if this run performed one, and
/// then removes the sentinel. A failed destroy leaves the sentinel in place.
#[derive(Debug)]
pub struct BootstrappedCluster {
    terraform: Terraform,
    module_dir: PathBuf,
    vars: ClusterVars,
    destroy_after: bool,
    skipped: bool,
    bootstrap_apply: Option<AppliedModule>,
}

/// Run the bootstrap phase unless the sentinel says it already happened.
pub fn bootstrap_cluster(
    terraform: &Terraform,
    module_dir: impl Into<PathBuf>,
    vars: ClusterVars,
    destroy_after: bool,
) -> Result<BootstrappedCluster, BootstrapError> {
    let module_dir = module_dir.into();
    let flag_path = module_dir.join(BOOTSTRAP_FLAG_FILE);

    if flag_path.exists() {
        info!(
            target: "cluster_tests::bootstrap",
            module_dir = %module_dir.display(),
            "Bootstrap sentinel present, skipping bootstrap apply"
        );
        return Ok(BootstrappedCluster {
            terraform: terraform.clone(),
            module_dir,
            vars,
            destroy_after,
            skipped: true,
            bootstrap_apply: None,
        });
    }

    info!(
        target: "cluster_tests::bootstrap",
        module_dir = %module_dir.display(),
        "Bootstrapping single-node cluster"
    );

    vars.write_tfvars(&module_dir, true)?;
    let applied = terraform.apply_scoped(&module_dir, destroy_after)?;

    fs::write(&flag_path, "").map_err(|source| BootstrapError::Io {
        path: flag_path.clone(),
        source,
    })?;

    Ok(BootstrappedCluster {
        terraform: terraform.clone(),
        module_dir,
        vars,
        destroy_after,
        skipped: false,
        bootstrap_apply: Some(applied),
    })
}

impl BootstrappedCluster {
    /// Whether the bootstrap apply was skipped because of the sentinel.
    pub fn was_skipped(&self) -> bool {
        self.skipped
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    pub fn flag_path(&self) -> PathBuf {
        self.module_dir.join(BOOTSTRAP_FLAG_FILE)
    }

    /// Apply the full topology with `bootstrap_mode = false`.
    pub fn scale_out(&self) -> Result<ClusterModule, BootstrapError> {
        info!(
            target: "cluster_tests::bootstrap",
            module_dir = %self.module_dir.display(),
            "Adding remaining master and data nodes"
        );

        self.vars.write_tfvars(&self.module_dir, false)?;
        let applied = self
            .terraform
            .apply_scoped(&self.module_dir, self.destroy_after)?;

        Ok(ClusterModule { applied })
    }
}

impl Drop for BootstrappedCluster {
    fn drop(&mut self) {
        if !self.destroy_after {
            return;
        }

        if let Some(applied) = self.bootstrap_apply.take() {
            if let Err(e) = applied.destroy() {
                error!(
                    target: "cluster_tests::bootstrap",
                    module_dir = %self.module_dir.display(),
                    error = %e,
                    "Failed to destroy bootstrapped cluster, keeping sentinel"
                );
                return;
            }
        }

        let flag_path = self.flag_path();
        if let Err(e) = fs::remove_file(&flag_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    target: "cluster_tests::bootstrap",
                    path = %flag_path.display(),
                    error = %e,
                    "Failed to remove bootstrap sentinel"
                );
            }
        }
    }
}

/// The fully scaled-out cluster root and its outputs.
#[derive(Debug)]
pub struct ClusterModule {
    applied: AppliedModule,
}

impl ClusterModule {
    pub fn outputs(&self) -> &TerraformOutputs {
        self.applied.outputs()
    }

    pub fn cluster_name(&self) -> Result<String, TerraformError> {
        self.outputs().string("cluster_name")
    }

    pub fn cluster_url(&self) -> Result<String, TerraformError> {
        self.outputs().string("cluster_url")
    }

    pub fn master_asg_name(&self) -> Result<String, TerraformError> {
        self.outputs().string("master_asg_name")
    }

    pub fn data_asg_name(&self) -> Result<String, TerraformError> {
        self.outputs().string("data_asg_name")
    }

    pub fn log_group_name(&self) -> Result<String, TerraformError> {
        self.outputs().string("cloudwatch_log_group")
    }

    /// Host name of `cluster_url`, the record the module creates in the subzone.
    pub fn cluster_host(&self) -> Result<String, TerraformError> {
        Ok(host_of(&self.cluster_url()?).to_string())
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', ':']).next().unwrap_or(rest)
}

/// Resolve a cluster test root under the configured Terraform root directory.
pub fn cluster_root(config: &TestConfig, name: &str) -> PathBuf {
    config.terraform_root_dir.join(name)
}

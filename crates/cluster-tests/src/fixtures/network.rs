//! Network and DNS prerequisites of the cluster roots.
//!
//! Both fixtures are Terraform roots under the configured root directory.
//! Their outputs feed the cluster's `terraform.tfvars`.

use crate::terraform::{AppliedModule, Terraform, TerraformError, TerraformOutputs};
use crate::tfvars::Tfvars;
use common::config::TestConfig;
use std::path::PathBuf;

/// Root module directory of the service network fixture.
pub const SERVICE_NETWORK_ROOT: &str = "service-network";

/// Root module directory of the DNS fixture.
pub const DNS_ROOT: &str = "dns";

fn write_tfvars(module_dir: &std::path::Path, tfvars: &Tfvars) -> Result<(), TerraformError> {
    tfvars
        .write(module_dir)
        .map_err(|source| TerraformError::Tfvars {
            module_dir: module_dir.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// VPC with public and private subnets and an internet gateway.
#[derive(Debug)]
pub struct ServiceNetwork {
    applied: AppliedModule,
}

impl ServiceNetwork {
    pub fn apply(terraform: &Terraform, config: &TestConfig) -> Result<Self, TerraformError> {
        let module_dir: PathBuf = config.terraform_root_dir.join(SERVICE_NETWORK_ROOT);

        let tfvars = Tfvars::new()
            .set("region", config.region.as_str())
            .set_opt("role_arn", config.test_role_arn.as_deref());
        write_tfvars(&module_dir, &tfvars)?;

        let applied = terraform.apply_scoped(module_dir, config.destroy_after())?;
        Ok(Self { applied })
    }

    pub fn outputs(&self) -> &TerraformOutputs {
        self.applied.outputs()
    }

    pub fn subnet_public_ids(&self) -> Result<Vec<String>, TerraformError> {
        self.outputs().string_list("subnet_public_ids")
    }

    pub fn subnet_private_ids(&self) -> Result<Vec<String>, TerraformError> {
        self.outputs().string_list("subnet_private_ids")
    }

    pub fn internet_gateway_id(&self) -> Result<String, TerraformError> {
        self.outputs().string("internet_gateway_id")
    }
}

/// Route53 subzone delegated from the test zone.
#[derive(Debug)]
pub struct DnsZone {
    applied: AppliedModule,
}

impl DnsZone {
    pub fn apply(terraform: &Terraform, config: &TestConfig) -> Result<Self, TerraformError> {
        let module_dir: PathBuf = config.terraform_root_dir.join(DNS_ROOT);

        let tfvars = Tfvars::new()
            .set("parent_zone_name", config.test_zone_name.as_str())
            .set("region", config.region.as_str())
            .set_opt("role_arn", config.test_role_arn.as_deref());
        write_tfvars(&module_dir, &tfvars)?;

        let applied = terraform.apply_scoped(module_dir, config.destroy_after())?;
        Ok(Self { applied })
    }

    pub fn outputs(&self) -> &TerraformOutputs {
        self.applied.outputs()
    }

    pub fn subzone_id(&self) -> Result<String, TerraformError> {
        self.outputs().string("subzone_id")
    }
}

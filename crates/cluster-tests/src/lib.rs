//! Elasticsearch Terraform Module Integration Test Suite
//!
//! This crate drives the Terraform test roots of the Elasticsearch module
//! against a live AWS account and validates the resulting cluster: the
//! two-phase bootstrap, instance refresh convergence, CloudWatch log delivery
//! and KMS encryption.
//!
//! # Features
//!
//! - `smoke`: Terraform/AWS CLI and credential checks
//! - `cluster`: Bootstrap and scale out the `test_module` root
//! - `migration`: Bootstrap and scale out the `test_migration` root
//! - `observability`: Log delivery, KMS and remote probes on the cluster
//! - `convergence`: Instance refresh completion on master and data groups
//! - `all`: Enable all test categories
//!
//! # Prerequisites
//!
//! 1. `terraform` and `aws` in PATH (or `TERRAFORM_BINARY` / `AWS_CLI_BINARY`)
//! 2. AWS credentials able to assume `TEST_ROLE_ARN` when it is set
//! 3. `TEST_ZONE_NAME` naming a Route53 zone the test account controls
//!
//! # Usage
//!
//! ```bash
//! # Offline unit tests only
//! cargo test
//!
//! # Smoke checks
//! TEST_ZONE_NAME=ci.example.com cargo test -p cluster-tests --features smoke
//!
//! # Full suite, keeping the infrastructure for the next run
//! TEST_KEEP_AFTER=true cargo test -p cluster-tests --features all -- --test-threads=1
//! ```

pub mod aws;
pub mod bootstrap;
pub mod context;
pub mod eventual;
pub mod fixtures;
pub mod logging;
pub mod refresh;
pub mod terraform;
pub mod tfvars;

#[cfg(test)]
pub(crate) mod testing;

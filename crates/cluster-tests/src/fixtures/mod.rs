//! Test fixtures for provisioning prerequisites and probing AWS resources.

pub mod autoscaling;
pub mod kms;
pub mod logs;
pub mod network;
pub mod remote;
pub mod route53;

pub use autoscaling::AutoscalingClient;
pub use kms::KmsClient;
pub use logs::CloudWatchLogsClient;
pub use network::{DnsZone, ServiceNetwork};
pub use remote::{RemoteExecutor, SsmExecutor};
pub use route53::Route53Client;

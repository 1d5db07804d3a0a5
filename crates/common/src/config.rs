//! Test harness configuration.
//!
//! Configuration is loaded from environment variables. The test role ARN
//! carries the account id, which is masked in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default AWS region for Terraform and AWS CLI calls.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default directory holding the Terraform test roots.
pub const DEFAULT_TERRAFORM_ROOT_DIR: &str = "test_data";

/// Default instance refresh poll interval in seconds.
pub const DEFAULT_REFRESH_POLL_INTERVAL_SECONDS: u64 = 30;

/// Allowed instance refresh poll interval range in seconds.
pub const REFRESH_POLL_INTERVAL_RANGE: (u64, u64) = (10, 60);

/// Default instance refresh timeout in seconds.
pub const DEFAULT_REFRESH_TIMEOUT_SECONDS: u64 = 3600;

/// Allowed instance refresh timeout range in seconds.
pub const REFRESH_TIMEOUT_RANGE: (u64, u64) = (600, 3600);

/// Harness configuration.
#[derive(Clone)]
pub struct TestConfig {
    /// Parent Route53 zone under which the DNS fixture creates a subzone.
    pub test_zone_name: String,

    /// AWS region (default: "us-west-2").
    pub region: String,

    /// Role assumed for AWS calls and passed to Terraform as `role_arn`.
    pub test_role_arn: Option<String>,

    /// Keep infrastructure after the tests finish.
    pub keep_after: bool,

    /// Run Terraform with `TF_LOG=JSON`.
    pub trace_terraform: bool,

    /// Directory holding the Terraform test roots.
    pub terraform_root_dir: PathBuf,

    /// Terraform executable.
    pub terraform_binary: PathBuf,

    /// AWS CLI executable.
    pub aws_cli_binary: PathBuf,

    /// Interval between instance refresh status checks.
    pub refresh_poll_interval: Duration,

    /// Wall-clock budget for an instance refresh.
    pub refresh_timeout: Duration,
}

impl TestConfig {
    /// Whether Terraform roots should be destroyed on scope exit.
    #[must_use]
    pub fn destroy_after(&self) -> bool {
        !self.keep_after
    }
}

impl fmt::Debug for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestConfig")
            .field("test_zone_name", &self.test_zone_name)
            .field("region", &self.region)
            .field(
                "test_role_arn",
                &self.test_role_arn.as_deref().map(mask_account_id),
            )
            .field("keep_after", &self.keep_after)
            .field("trace_terraform", &self.trace_terraform)
            .field("terraform_root_dir", &self.terraform_root_dir)
            .field("terraform_binary", &self.terraform_binary)
            .field("aws_cli_binary", &self.aws_cli_binary)
            .field("refresh_poll_interval", &self.refresh_poll_interval)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

/// Replace the account id field of an ARN with asterisks.
fn mask_account_id(arn: &str) -> String {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() == 6 {
        let masked: Vec<String> = parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if i == 4 {
                    "*".repeat(part.len())
                } else {
                    (*part).to_string()
                }
            })
            .collect();
        masked.join(":")
    } else {
        "[REDACTED]".to_string()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBool(String),

    #[error("Invalid instance refresh configuration: {0}")]
    InvalidRefresh(String),
}

impl TestConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let test_zone_name = vars
            .get("TEST_ZONE_NAME")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TEST_ZONE_NAME".to_string()))?
            .clone();

        let region = vars
            .get("TEST_AWS_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let test_role_arn = vars
            .get("TEST_ROLE_ARN")
            .filter(|v| !v.trim().is_empty())
            .cloned();

        let keep_after = parse_bool(vars, "TEST_KEEP_AFTER")?;
        let trace_terraform = parse_bool(vars, "TERRAFORM_TRACE")?;

        let terraform_root_dir = vars
            .get("TERRAFORM_ROOT_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_TERRAFORM_ROOT_DIR), PathBuf::from);

        let terraform_binary = vars
            .get("TERRAFORM_BINARY")
            .map_or_else(|| PathBuf::from("terraform"), PathBuf::from);

        let aws_cli_binary = vars
            .get("AWS_CLI_BINARY")
            .map_or_else(|| PathBuf::from("aws"), PathBuf::from);

        let poll_interval_seconds = parse_seconds_in_range(
            vars,
            "REFRESH_POLL_INTERVAL_SECONDS",
            DEFAULT_REFRESH_POLL_INTERVAL_SECONDS,
            REFRESH_POLL_INTERVAL_RANGE,
        )?;

        let timeout_seconds = parse_seconds_in_range(
            vars,
            "REFRESH_TIMEOUT_SECONDS",
            DEFAULT_REFRESH_TIMEOUT_SECONDS,
            REFRESH_TIMEOUT_RANGE,
        )?;

        Ok(Self {
            test_zone_name,
            region,
            test_role_arn,
            keep_after,
            trace_terraform,
            terraform_root_dir,
            terraform_binary,
            aws_cli_binary,
            refresh_poll_interval: Duration::from_secs(poll_interval_seconds),
            refresh_timeout: Duration::from_secs(timeout_seconds),
        })
    }
}

fn parse_bool(vars: &HashMap<String, String>, name: &str) -> Result<bool, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(false);
    };

    match value_str.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidBool(format!(
            "{name} must be one of true/false/1/0/yes/no, got '{other}'"
        ))),
    }
}

fn parse_seconds_in_range(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    (min, max): (u64, u64),
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidRefresh(format!(
            "{name} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value < min || value > max {
        return Err(ConfigError::InvalidRefresh(format!(
            "{name} must be between {min} and {max} seconds, got {value}"
        )));
    }

    Ok(value)
}

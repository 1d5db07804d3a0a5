//! AWS CLI invocation.
//!
//! Every AWS call goes through the `aws` CLI with `--output json`, decoded
//! into typed responses with serde. When a test role is configured its
//! temporary credentials are passed to each invocation through the
//! environment.

use common::config::TestConfig;
use common::secret::AwsCredentials;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Session name used when assuming the test role.
pub const ROLE_SESSION_NAME: &str = "elastic-module-tests";

/// AWS CLI errors.
#[derive(Debug, Error)]
pub enum AwsError {
    #[error("Failed to run aws {service} {operation}: {source}")]
    Spawn {
        service: String,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("aws {service} {operation} exited with code {code:?}: {stderr}")]
    Failed {
        service: String,
        operation: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to decode aws {operation} response: {source}")]
    InvalidResponse {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Unexpected(String),
}

impl AwsError {
    /// AWS error code reported by the CLI, e.g. `ResourceAlreadyExistsException`.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            AwsError::Failed { stderr, .. } => extract_error_code(stderr),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.error_code() == Some(code)
    }
}

/// Parse the code out of `An error occurred (Code) when calling the Op operation: ...`.
fn extract_error_code(stderr: &str) -> Option<&str> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

    PATTERN
        .get_or_init(|| Regex::new(r"An error occurred \(([A-Za-z0-9_.]+)\)").ok())
        .as_ref()?
        .captures(stderr)?
        .get(1)
        .map(|m| m.as_str())
}

/// Handle for running AWS CLI commands in one region.
#[derive(Debug, Clone)]
pub struct AwsCli {
    binary: PathBuf,
    region: String,
    credentials: Option<AwsCredentials>,
}

impl AwsCli {
    pub fn new(binary: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            region: region.into(),
            credentials: None,
        }
    }

    /// Build a CLI handle from config, assuming the test role when one is set.
    pub async fn connect(config: &TestConfig) -> Result<Self, AwsError> {
        let cli = Self::new(&config.aws_cli_binary, &config.region);

        match &config.test_role_arn {
            Some(role_arn) => cli.assume_role(role_arn).await,
            None => Ok(cli),
        }
    }

    /// Return a handle that runs with the role's temporary credentials.
    pub async fn assume_role(self, role_arn: &str) -> Result<Self, AwsError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct AssumeRoleResponse {
            credentials: AwsCredentials,
        }

        let response: AssumeRoleResponse = self
            .call(
                "sts",
                "assume-role",
                &[
                    "--role-arn",
                    role_arn,
                    "--role-session-name",
                    ROLE_SESSION_NAME,
                ],
            )
            .await?;

        info!(
            target: "cluster_tests::aws",
            expiration = %response.credentials.expiration,
            "Assumed test role"
        );

        Ok(Self {
            credentials: Some(response.credentials),
            ..self
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn credentials(&self) -> Option<&AwsCredentials> {
        self.credentials.as_ref()
    }

    fn command(&self, service: &str, operation: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(service)
            .arg(operation)
            .args(args)
            .args(["--region", self.region.as_str(), "--output", "json"])
            .env("AWS_PAGER", "")
            .kill_on_drop(true);

        if let Some(credentials) = &self.credentials {
            for (name, value) in credentials.env_vars() {
                cmd.env(name, value);
            }
        }
        cmd
    }

    /// Run a command and return its raw stdout.
    pub async fn call_raw(
        &self,
        service: &str,
        operation: &str,
        args: &[&str],
    ) -> Result<String, AwsError> {
        debug!(
            target: "cluster_tests::aws",
            service,
            operation,
            "Calling AWS"
        );

        let output = self
            .command(service, operation, args)
            .output()
            .await
            .map_err(|source| AwsError::Spawn {
                service: service.to_string(),
                operation: operation.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(AwsError::Failed {
                service: service.to_string(),
                operation: operation.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command and decode its JSON response.
    pub async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        args: &[&str],
    ) -> Result<T, AwsError> {
        let stdout = self.call_raw(service, operation, args).await?;
        decode(operation, &stdout)
    }

    /// Run a command whose response body is empty.
    pub async fn call_unit(
        &self,
        service: &str,
        operation: &str,
        args: &[&str],
    ) -> Result<(), AwsError> {
        self.call_raw(service, operation, args).await.map(|_| ())
    }

    /// Account id of the active credentials.
    pub async fn account_id(&self) -> Result<String, AwsError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct CallerIdentity {
            account: String,
        }

        let identity: CallerIdentity = self.call("sts", "get-caller-identity", &[]).await?;
        Ok(identity.account)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T, AwsError> {
    serde_json::from_str(body).map_err(|source| AwsError::InvalidResponse {
        operation: operation.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> AwsError {
        AwsError::Failed {
            service: "logs".to_string(),
            operation: "create-log-stream".to_string(),
            code: Some(254),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_error_code_extraction() {
        let err = failed(
            "An error occurred (ResourceAlreadyExistsException) when calling the \
             CreateLogStream operation: The specified log stream already exists",
        );

        assert_eq!(err.error_code(), Some("ResourceAlreadyExistsException"));
        assert!(err.is_code("ResourceAlreadyExistsException"));
        assert!(!err.is_code("ResourceNotFoundException"));
    }

    #[test]
    fn test_error_code_missing() {
        assert_eq!(failed("Unable to locate credentials").error_code(), None);
        assert_eq!(AwsError::Unexpected("boom".to_string()).error_code(), None);
    }

    #[test]
    fn test_decode_reports_operation() {
        let err = decode::<serde_json::Value>("get-log-events", "not json")
            .expect_err("decode should fail");
        assert!(err.to_string().contains("get-log-events"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = AwsCli::new(dir.path().join("no-such-aws"), "us-west-2");

        let err = cli
            .account_id()
            .await
            .expect_err("missing binary should fail");
        assert!(matches!(err, AwsError::Spawn { .. }));
    }
}

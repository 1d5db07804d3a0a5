//! Remote command execution on cluster instances.
//!
//! Probes only need "run this shell command on that instance and give me the
//! result", so they depend on the [`RemoteExecutor`] trait. [`SsmExecutor`]
//! implements it with SSM Run Command.

use crate::aws::{AwsCli, AwsError};
use crate::eventual::{eventually, ConsistencyCategory};
use serde::Deserialize;
use tracing::{debug, info};

/// SSM document that runs shell commands on Linux instances.
pub const RUN_SHELL_SCRIPT_DOCUMENT: &str = "AWS-RunShellScript";

/// Result of a command run on an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == "Success" && self.exit_code == 0
    }
}

/// Runs shell commands on instances (enables mocking).
#[async_trait::async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, instance_id: &str, command: &str) -> Result<CommandResult, AwsError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendCommandResponse {
    command: SentCommand,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentCommand {
    command_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandInvocation {
    status: String,
    #[serde(default = "no_response_code")]
    response_code: i32,
    #[serde(default)]
    standard_output_content: String,
    #[serde(default)]
    standard_error_content: String,
}

fn no_response_code() -> i32 {
    -1
}

impl CommandInvocation {
    fn is_finished(&self) -> bool {
        !matches!(
            self.status.as_str(),
            "Pending" | "InProgress" | "Delayed" | "Cancelling"
        )
    }

    fn into_result(self) -> CommandResult {
        CommandResult {
            status: self.status,
            exit_code: self.response_code,
            stdout: self.standard_output_content,
            stderr: self.standard_error_content,
        }
    }
}

/// Executor backed by SSM Run Command.
#[derive(Debug, Clone)]
pub struct SsmExecutor {
    aws: AwsCli,
}

impl SsmExecutor {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }

    async fn send_command(&self, instance_id: &str, command: &str) -> Result<String, AwsError> {
        let parameters = serde_json::json!({ "commands": [command] }).to_string();

        let response: SendCommandResponse = self
            .aws
            .call(
                "ssm",
                "send-command",
                &[
                    "--instance-ids",
                    instance_id,
                    "--document-name",
                    RUN_SHELL_SCRIPT_DOCUMENT,
                    "--parameters",
                    &parameters,
                ],
            )
            .await?;

        Ok(response.command.command_id)
    }

    /// One `get-command-invocation` check.
    ///
    /// `None` means keep waiting: the command is still running or SSM has
    /// not registered the invocation yet.
    async fn check_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Option<Result<CommandResult, AwsError>> {
        let result: Result<CommandInvocation, AwsError> = self
            .aws
            .call(
                "ssm",
                "get-command-invocation",
                &["--command-id", command_id, "--instance-id", instance_id],
            )
            .await;

        match result {
            Ok(invocation) if invocation.is_finished() => Some(Ok(invocation.into_result())),
            Ok(invocation) => {
                debug!(
                    target: "cluster_tests::fixtures::remote",
                    command_id,
                    instance_id,
                    status = %invocation.status,
                    "Command still running"
                );
                None
            }
            Err(e) if e.is_code("InvocationDoesNotExist") => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[async_trait::async_trait]
impl RemoteExecutor for SsmExecutor {
    async fn execute(&self, instance_id: &str, command: &str) -> Result<CommandResult, AwsError> {
        let command_id = self.send_command(instance_id, command).await?;

        info!(
            target: "cluster_tests::fixtures::remote",
            instance_id,
            command_id = %command_id,
            command,
            "Sent command"
        );

        eventually(ConsistencyCategory::RemoteCommand, || {
            self.check_invocation(&command_id, instance_id)
        })
        .await
        .map_err(|e| AwsError::Unexpected(format!("Command {command_id} on {instance_id}: {e}")))?
    }
}

/// Mock executor module for testing probes.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Executor that answers from a command -> result table and records calls.
    #[derive(Default)]
    pub struct MockExecutor {
        results: HashMap<String, CommandResult>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `command` with the given exit code and stdout.
        pub fn with_result(mut self, command: &str, exit_code: i32, stdout: &str) -> Self {
            self.results.insert(
                command.to_string(),
                CommandResult {
                    status: if exit_code == 0 { "Success" } else { "Failed" }.to_string(),
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            );
            self
        }

        /// `(instance_id, command)` pairs executed so far.
        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl RemoteExecutor for MockExecutor {
        async fn execute(
            &self,
            instance_id: &str,
            command: &str,
        ) -> Result<CommandResult, AwsError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((instance_id.to_string(), command.to_string()));
            }
            self.results
                .get(command)
                .cloned()
                .ok_or_else(|| AwsError::Unexpected(format!("unexpected command: {command}")))
        }
    }
}

/// Run a command on every instance and return the ones where it failed.
pub async fn failing_instances<E>(
    executor: &E,
    instance_ids: &[String],
    command: &str,
) -> Result<Vec<(String, CommandResult)>, AwsError>
where
    E: RemoteExecutor + ?Sized,
{
    let mut failures = Vec::new();
    for instance_id in instance_ids {
        let result = executor.execute(instance_id, command).await?;
        if !result.success() {
            failures.push((instance_id.clone(), result));
        }
    }
    Ok(failures)
}

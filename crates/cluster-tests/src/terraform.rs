//! Terraform CLI lifecycle.
//!
//! `Terraform` runs the CLI synchronously inside a root module directory.
//! `Terraform::apply_scoped` returns an `AppliedModule` guard holding the
//! parsed outputs; dropping the guard destroys the module when requested, so
//! teardown also happens when a test panics.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{error, info, warn};

/// Terraform CLI errors.
#[derive(Debug, Error)]
pub enum TerraformError {
    #[error("Failed to run terraform {subcommand} in {module_dir}: {source}")]
    Spawn {
        subcommand: &'static str,
        module_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("terraform {subcommand} in {module_dir} exited with code {code:?}: {stderr}")]
    Failed {
        subcommand: &'static str,
        module_dir: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to write variables for {module_dir}: {source}")]
    Tfvars {
        module_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse terraform output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("Terraform output '{0}' is missing")]
    MissingOutput(String),

    #[error("Terraform output '{name}' is not a {expected}")]
    OutputType { name: String, expected: &'static str },
}

/// One entry of `terraform output -json`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputValue {
    pub value: Value,
    #[serde(default)]
    pub sensitive: bool,
}

/// Parsed `terraform output -json` document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct TerraformOutputs(BTreeMap<String, OutputValue>);

impl TerraformOutputs {
    pub fn from_json(json: &str) -> Result<Self, TerraformError> {
        // `terraform output -json` on an empty state prints `{}`; older
        // releases print nothing at all.
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, name: &str) -> Result<&Value, TerraformError> {
        self.0
            .get(name)
            .map(|output| &output.value)
            .ok_or_else(|| TerraformError::MissingOutput(name.to_string()))
    }

    pub fn string(&self, name: &str) -> Result<String, TerraformError> {
        self.get(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TerraformError::OutputType {
                name: name.to_string(),
                expected: "string",
            })
    }

    pub fn string_list(&self, name: &str) -> Result<Vec<String>, TerraformError> {
        let type_error = || TerraformError::OutputType {
            name: name.to_string(),
            expected: "list of strings",
        };

        self.get(name)?
            .as_array()
            .ok_or_else(type_error)?
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(type_error))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Pretty JSON of all output values with sensitive ones redacted.
    pub fn redacted_json(&self) -> String {
        let redacted: BTreeMap<&str, Value> = self
            .0
            .iter()
            .map(|(name, output)| {
                let value = if output.sensitive {
                    Value::String("[REDACTED]".to_string())
                } else {
                    output.value.clone()
                };
                (name.as_str(), value)
            })
            .collect();

        serde_json::to_string_pretty(&redacted).unwrap_or_default()
    }
}

/// Terraform CLI handle.
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: PathBuf,
    trace: bool,
    env: Vec<(String, String)>,
}

impl Terraform {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            trace: false,
            env: Vec::new(),
        }
    }

    /// Run every invocation with `TF_LOG=JSON`.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Add an environment variable to every invocation.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    fn command(&self, module_dir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(module_dir);
        if self.trace {
            cmd.env("TF_LOG", "JSON");
        }
        for (name, value) in &self.env {
            cmd.env(name, value);
        }
        cmd
    }

    /// Run a subcommand with inherited stdout so plans stream to the test log.
    fn run(
        &self,
        subcommand: &'static str,
        module_dir: &Path,
        args: &[&str],
    ) -> Result<(), TerraformError> {
        info!(
            target: "cluster_tests::terraform",
            subcommand,
            module_dir = %module_dir.display(),
            "Running terraform"
        );

        let output = self
            .command(module_dir, args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| TerraformError::Spawn {
                subcommand,
                module_dir: module_dir.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(TerraformError::Failed {
                subcommand,
                module_dir: module_dir.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    /// Run a subcommand and capture its stdout.
    fn capture(
        &self,
        subcommand: &'static str,
        module_dir: &Path,
        args: &[&str],
    ) -> Result<String, TerraformError> {
        let output = self
            .command(module_dir, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| TerraformError::Spawn {
                subcommand,
                module_dir: module_dir.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(TerraformError::Failed {
                subcommand,
                module_dir: module_dir.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn init(&self, module_dir: &Path) -> Result<(), TerraformError> {
        self.run("init", module_dir, &["init", "-input=false"])
    }

    pub fn apply(&self, module_dir: &Path) -> Result<(), TerraformError> {
        self.run("apply", module_dir, &["apply", "-input=false", "-auto-approve"])
    }

    pub fn destroy(&self, module_dir: &Path) -> Result<(), TerraformError> {
        self.run(
            "destroy",
            module_dir,
            &["destroy", "-input=false", "-auto-approve"],
        )
    }

    pub fn output(&self, module_dir: &Path) -> Result<TerraformOutputs, TerraformError> {
        let json = self.capture("output", module_dir, &["output", "-json"])?;
        TerraformOutputs::from_json(&json)
    }

    /// Terraform version string, e.g. "1.9.5".
    pub fn version(&self) -> Result<String, TerraformError> {
        #[derive(Deserialize)]
        struct Version {
            terraform_version: String,
        }

        let json = self.capture("version", Path::new("."), &["version", "-json"])?;
        let version: Version = serde_json::from_str(&json)?;
        Ok(version.terraform_version)
    }

    /// Init and apply a root module, returning a guard that owns its teardown.
    ///
    /// When the apply or reading its outputs fails and `destroy_after` is
    /// set, whatever was created is destroyed before the error is returned.
    pub fn apply_scoped(
        &self,
        module_dir: impl Into<PathBuf>,
        destroy_after: bool,
    ) -> Result<AppliedModule, TerraformError> {
        let module_dir = module_dir.into();

        self.init(&module_dir)?;
        if let Err(e) = self.apply(&module_dir) {
            if destroy_after {
                warn!(
                    target: "cluster_tests::terraform",
                    module_dir = %module_dir.display(),
                    error = %e,
                    "Apply failed, destroying partially created resources"
                );
                if let Err(destroy_err) = self.destroy(&module_dir) {
                    error!(
                        target: "cluster_tests::terraform",
                        module_dir = %module_dir.display(),
                        error = %destroy_err,
                        "Destroy after failed apply also failed"
                    );
                }
            }
            return Err(e);
        }

        // Guard first, so a failing `output` still tears the module down.
        let mut applied = AppliedModule {
            terraform: self.clone(),
            module_dir,
            outputs: TerraformOutputs::default(),
            destroy_after,
        };
        applied.outputs = self.output(&applied.module_dir)?;

        info!(
            target: "cluster_tests::terraform",
            module_dir = %applied.module_dir.display(),
            outputs = %applied.outputs.redacted_json(),
            "Applied module"
        );

        Ok(applied)
    }
}

/// An applied Terraform root module.
///
/// Destroys the module on drop when `destroy_after` is set.
#[derive(Debug)]
pub struct AppliedModule {
    terraform: Terraform,
    module_dir: PathBuf,
    outputs: TerraformOutputs,
    destroy_after: bool,
}

impl AppliedModule {
    pub fn outputs(&self) -> &TerraformOutputs {
        &self.outputs
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    pub fn destroy_after(&self) -> bool {
        self.destroy_after
    }

    /// Destroy now and report the result instead of logging it on drop.
    pub fn destroy(mut self) -> Result<(), TerraformError> {
        self.destroy_after = false;
        self.terraform.destroy(&self.module_dir)
    }
}

impl Drop for AppliedModule {
    fn drop(&mut self) {
        if !self.destroy_after {
            info!(
                target: "cluster_tests::terraform",
                module_dir = %self.module_dir.display(),
                "Keeping module resources"
            );
            return;
        }

        if let Err(e) = self.terraform.destroy(&self.module_dir) {
            error!(
                target: "cluster_tests::terraform",
                module_dir = %self.module_dir.display(),
                error = %e,
                "Failed to destroy module"
            );
        }
    }
}

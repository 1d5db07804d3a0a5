//! Fake Terraform binary for offline unit tests.

use crate::terraform::Terraform;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File the fake binary appends one line per invocation to, inside the module directory.
const INVOCATION_LOG: &str = "invocations.log";

/// Version the fake binary reports for `terraform version -json`.
pub(crate) const FAKE_VERSION: &str = "1.9.5";

const OUTPUTS: &str = r#"{
  "cluster_name": {"sensitive": false, "type": "string", "value": "elastic-test"},
  "cluster_url": {"sensitive": false, "type": "string", "value": "https://elastic-test.ci.example.com"},
  "master_asg_name": {"sensitive": false, "type": "string", "value": "elastic-test-master"},
  "data_asg_name": {"sensitive": false, "type": "string", "value": "elastic-test-data"},
  "cloudwatch_log_group": {"sensitive": false, "type": "string", "value": "/elasticsearch/elastic-test"}
}"#;

/// A shell script standing in for `terraform`.
///
/// Each run appends `<subcommand>[ bootstrap_mode=..][ subnets=..][ TF_LOG=..]`
/// to `invocations.log` in the working directory.
pub(crate) struct FakeTerraform {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeTerraform {
    pub(crate) fn new() -> Self {
        Self::scripted(0, 0, OUTPUTS)
    }

    pub(crate) fn failing_apply() -> Self {
        Self::scripted(1, 0, OUTPUTS)
    }

    /// `output` succeeds but prints something that is not JSON.
    pub(crate) fn invalid_output() -> Self {
        Self::scripted(0, 0, "not json")
    }

    pub(crate) fn failing_destroy() -> Self {
        Self::scripted(0, 1, OUTPUTS)
    }

    fn scripted(apply_code: i32, destroy_code: i32, outputs: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let binary = dir.path().join("terraform");
        let script = format!(
            r#"#!/bin/sh
if [ "$1" = "version" ]; then
  echo '{{"terraform_version": "{version}", "platform": "linux_amd64"}}'
  exit 0
fi
entry="$1"
if [ "$1" = "apply" ] && [ -f terraform.tfvars ]; then
  mode=$(sed -n 's/^bootstrap_mode *= *//p' terraform.tfvars)
  subnets=$(sed -n 's/^backend_subnet_ids *= *//p' terraform.tfvars)
  [ -n "$mode" ] && entry="$entry bootstrap_mode=$mode"
  [ -n "$subnets" ] && entry="$entry subnets=$subnets"
fi
[ -n "$TF_LOG" ] && entry="$entry TF_LOG=$TF_LOG"
echo "$entry" >> {log}
case "$1" in
  apply)
    exit {apply_code}
    ;;
  destroy)
    exit {destroy_code}
    ;;
  output)
    cat <<'JSON'
{outputs}
JSON
    ;;
esac
exit 0
"#,
            version = FAKE_VERSION,
            log = INVOCATION_LOG,
            apply_code = apply_code,
            destroy_code = destroy_code,
            outputs = outputs,
        );

        fs::write(&binary, script).expect("write fake terraform");
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))
            .expect("chmod fake terraform");

        Self { dir, binary }
    }

    pub(crate) fn binary(&self) -> &Path {
        &self.binary
    }

    pub(crate) fn terraform(&self) -> Terraform {
        Terraform::new(&self.binary)
    }

    /// Create an empty root module directory.
    pub(crate) fn module_dir(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::create_dir_all(&path).expect("create module dir");
        path
    }

    /// Subcommands the fake binary saw in a module directory, in order.
    pub(crate) fn invocations(&self, module_dir: &Path) -> Vec<String> {
        fs::read_to_string(module_dir.join(INVOCATION_LOG))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

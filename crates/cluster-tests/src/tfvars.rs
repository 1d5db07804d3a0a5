//! Terraform variable file rendering.
//!
//! Each test root is configured through a `terraform.tfvars` file written
//! right before `terraform apply`. Values are rendered as HCL literals:
//! strings are quoted with JSON escaping plus template escaping, lists as
//! JSON arrays and booleans in lower case.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name Terraform loads automatically from the root module directory.
pub const TFVARS_FILE: &str = "terraform.tfvars";

/// A single Terraform variable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TfValue {
    String(String),
    Bool(bool),
    List(Vec<String>),
}

impl TfValue {
    /// Render the value as an HCL literal.
    pub fn render(&self) -> String {
        match self {
            TfValue::String(s) => quote(s),
            TfValue::Bool(b) => b.to_string(),
            TfValue::List(items) => {
                let quoted: Vec<String> = items.iter().map(|item| quote(item)).collect();
                format!("[{}]", quoted.join(", "))
            }
        }
    }
}

/// Quote a string as an HCL literal.
///
/// JSON string escaping covers quotes, backslashes and control characters.
/// HCL additionally treats `${` and `%{` as template sequences.
fn quote(value: &str) -> String {
    let escaped = value.replace("${", "$${").replace("%{", "%%{");
    serde_json::Value::String(escaped).to_string()
}

impl From<&str> for TfValue {
    fn from(value: &str) -> Self {
        TfValue::String(value.to_string())
    }
}

impl From<String> for TfValue {
    fn from(value: String) -> Self {
        TfValue::String(value)
    }
}

impl From<bool> for TfValue {
    fn from(value: bool) -> Self {
        TfValue::Bool(value)
    }
}

impl From<Vec<String>> for TfValue {
    fn from(value: Vec<String>) -> Self {
        TfValue::List(value)
    }
}

impl From<&[String]> for TfValue {
    fn from(value: &[String]) -> Self {
        TfValue::List(value.to_vec())
    }
}

/// An ordered set of Terraform variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tfvars {
    entries: Vec<(String, TfValue)>,
}

impl Tfvars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing an earlier value in place.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<TfValue>) -> Self {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Set a variable only when a value is present.
    pub fn set_opt<V: Into<TfValue>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(name, value),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TfValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Render the file contents, aligning `=` like `terraform fmt`.
    pub fn render(&self) -> String {
        let width = self
            .entries
            .iter()
            .map(|(key, _)| key.len())
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(&format!("{key:<width$} = {}\n", value.render()));
        }
        out
    }

    /// Write `terraform.tfvars` into the module directory.
    pub fn write(&self, module_dir: &Path) -> io::Result<PathBuf> {
        let path = module_dir.join(TFVARS_FILE);
        fs::write(&path, self.render())?;

        tracing::debug!(
            target: "cluster_tests::tfvars",
            path = %path.display(),
            variables = self.entries.len(),
            "Wrote Terraform variables"
        );

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_aligns_and_keeps_order() {
        let tfvars = Tfvars::new()
            .set("region", "us-west-2")
            .set("bootstrap_mode", true)
            .set("lb_subnet_ids", vec!["subnet-a".to_string(), "subnet-b".to_string()]);

        assert_eq!(
            tfvars.render(),
            "region         = \"us-west-2\"\n\
             bootstrap_mode = true\n\
             lb_subnet_ids  = [\"subnet-a\", \"subnet-b\"]\n"
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let tfvars = Tfvars::new()
            .set("a", true)
            .set("b", "x")
            .set("a", false);

        assert_eq!(tfvars.render(), "a = false\nb = \"x\"\n");
        assert_eq!(tfvars.get("a"), Some(&TfValue::Bool(false)));
    }

    #[test]
    fn test_set_opt_skips_none() {
        let tfvars = Tfvars::new()
            .set_opt("role_arn", None::<String>)
            .set_opt("environment", Some("sandbox"));

        assert_eq!(tfvars.get("role_arn"), None);
        assert_eq!(
            tfvars.get("environment"),
            Some(&TfValue::String("sandbox".to_string()))
        );
    }

    #[test]
    fn test_strings_are_escaped() {
        let value = TfValue::from("say \"hi\"\\ ${var.x} %{ if }\n");
        assert_eq!(
            value.render(),
            r#""say \"hi\"\\ $${var.x} %%{ if }\n""#
        );
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(TfValue::List(Vec::new()).render(), "[]");
        assert_eq!(Tfvars::new().render(), "");
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Tfvars::new()
            .set("region", "eu-west-1")
            .write(dir.path())
            .expect("write tfvars");

        assert_eq!(path, dir.path().join(TFVARS_FILE));
        let contents = std::fs::read_to_string(path).expect("read tfvars");
        assert_eq!(contents, "region = \"eu-west-1\"\n");
    }
}

//! Credential types that keep secrets out of logs.
//!
//! This module re-exports types from the [`secrecy`] crate and defines the
//! temporary AWS session credentials obtained by assuming the test role.
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one is safe to pass to tracing.
//!
//! # Example
//!
//! ```rust
//! use common::secret::AwsCredentials;
//! use secrecy::ExposeSecret;
//!
//! let json = r#"{
//!     "AccessKeyId": "ASIAEXAMPLE",
//!     "SecretAccessKey": "wJalrXUtnFEMI",
//!     "SessionToken": "FwoGZXIvYXdzE",
//!     "Expiration": "2026-10-19T12:00:00+00:00"
//! }"#;
//! let creds: AwsCredentials = serde_json::from_str(json).unwrap();
//!
//! assert!(!format!("{creds:?}").contains("wJalrXUtnFEMI"));
//! assert_eq!(creds.secret_access_key.expose_secret(), "wJalrXUtnFEMI");
//! ```

use serde::Deserialize;

pub use secrecy::{ExposeSecret, SecretString};

/// Temporary credentials returned by `sts assume-role`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    pub expiration: String,
}

impl AwsCredentials {
    /// Environment variables understood by the AWS CLI and Terraform's AWS provider.
    #[must_use]
    pub fn env_vars(&self) -> [(&'static str, &str); 3] {
        [
            ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
            (
                "AWS_SECRET_ACCESS_KEY",
                self.secret_access_key.expose_secret(),
            ),
            ("AWS_SESSION_TOKEN", self.session_token.expose_secret()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const ASSUMED: &str = r#"{
        "AccessKeyId": "ASIATESTKEY",
        "SecretAccessKey": "very-secret-key",
        "SessionToken": "very-secret-token",
        "Expiration": "2026-10-19T12:00:00+00:00"
    }"#;

    #[test]
    fn test_debug_is_redacted() {
        let creds: AwsCredentials = serde_json::from_str(ASSUMED).expect("deserialize");
        let debug = format!("{creds:?}");

        assert!(debug.contains("ASIATESTKEY"));
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("very-secret-key"));
        assert!(!debug.contains("very-secret-token"));
    }

    #[test]
    fn test_env_vars_expose_values() {
        let creds: AwsCredentials = serde_json::from_str(ASSUMED).expect("deserialize");
        let vars = creds.env_vars();

        assert_eq!(vars[0], ("AWS_ACCESS_KEY_ID", "ASIATESTKEY"));
        assert_eq!(vars[1], ("AWS_SECRET_ACCESS_KEY", "very-secret-key"));
        assert_eq!(vars[2], ("AWS_SESSION_TOKEN", "very-secret-token"));
    }

    #[test]
    fn test_clone_works() {
        let creds: AwsCredentials = serde_json::from_str(ASSUMED).expect("deserialize");
        let cloned = creds.clone();
        assert_eq!(cloned.session_token.expose_secret(), "very-secret-token");
    }
}

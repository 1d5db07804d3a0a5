//! KMS client fixture.

use crate::aws::{AwsCli, AwsError};
use serde::Deserialize;

/// Key metadata from `describe-key`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyMetadata {
    pub key_id: String,
    pub arn: String,
    pub key_state: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

impl KeyMetadata {
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.key_state == "Enabled"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeKeyResponse {
    key_metadata: KeyMetadata,
}

/// Client for the KMS API.
#[derive(Debug, Clone)]
pub struct KmsClient {
    aws: AwsCli,
}

impl KmsClient {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }

    /// Describe a key by id, ARN or alias.
    pub async fn describe_key(&self, key_id: &str) -> Result<KeyMetadata, AwsError> {
        let response: DescribeKeyResponse = self
            .aws
            .call("kms", "describe-key", &["--key-id", key_id])
            .await?;
        Ok(response.key_metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::decode;

    #[test]
    fn test_decode_key_metadata() {
        let body = r#"{
            "KeyMetadata": {
                "AWSAccountId": "123456789012",
                "KeyId": "1234abcd-12ab-34cd-56ef-1234567890ab",
                "Arn": "arn:aws:kms:us-west-2:123456789012:key/1234abcd-12ab-34cd-56ef-1234567890ab",
                "CreationDate": 1760870400.0,
                "Enabled": true,
                "Description": "elastic-test CloudWatch logs",
                "KeyUsage": "ENCRYPT_DECRYPT",
                "KeyState": "Enabled",
                "KeyManager": "CUSTOMER"
            }
        }"#;

        let response: DescribeKeyResponse = decode("describe-key", body).expect("decode");
        assert!(response.key_metadata.is_enabled());
        assert_eq!(
            response.key_metadata.key_id,
            "1234abcd-12ab-34cd-56ef-1234567890ab"
        );
    }

    #[test]
    fn test_pending_deletion_is_not_enabled() {
        let body = r#"{"KeyMetadata": {
            "KeyId": "k", "Arn": "arn:aws:kms:us-west-2:1:key/k",
            "Enabled": false, "KeyState": "PendingDeletion"
        }}"#;

        let response: DescribeKeyResponse = decode("describe-key", body).expect("decode");
        assert!(!response.key_metadata.is_enabled());
    }
}

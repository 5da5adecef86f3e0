//! AWS KMS key provider.
//!
//! Enable with `--features aws`. Credentials come from the default provider
//! chain (environment, profile, instance role). The encryption context is
//! passed to KMS as the KMS encryption context, so CloudTrail records it and
//! `Decrypt` fails when it differs.

use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use async_trait::async_trait;
use tracing::trace;
use zeroize::Zeroizing;

use super::{DataKey, KeyProvider, PlaintextKey, DATA_KEY_LEN};
use crate::core::envelope::EncryptionContext;
use crate::error::{KmsError, Result};

/// Key provider backed by AWS Key Management Service
#[derive(Debug, Clone)]
pub struct AwsKms {
    client: aws_sdk_kms::Client,
}

impl AwsKms {
    /// Build a client from the default AWS configuration, optionally pinned
    /// to `region`.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_kms::config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self::from_client(aws_sdk_kms::Client::new(&config))
    }

    /// Wrap an existing client.
    pub fn from_client(client: aws_sdk_kms::Client) -> Self {
        Self { client }
    }
}

fn to_key(bytes: &[u8]) -> std::result::Result<PlaintextKey, String> {
    if bytes.len() != DATA_KEY_LEN {
        return Err(format!(
            "KMS returned a {}-byte key, expected {}",
            bytes.len(),
            DATA_KEY_LEN
        ));
    }
    let mut key = Zeroizing::new([0u8; DATA_KEY_LEN]);
    key.copy_from_slice(bytes);
    Ok(key)
}

#[async_trait]
impl KeyProvider for AwsKms {
    fn provider_id(&self) -> &'static str {
        "aws-kms"
    }

    async fn generate_data_key(
        &self,
        master_key: &str,
        context: &EncryptionContext,
    ) -> Result<DataKey> {
        trace!(key_id = %master_key, "requesting data key from AWS KMS");

        let output = self
            .client
            .generate_data_key()
            .key_id(master_key)
            .key_spec(DataKeySpec::Aes256)
            .set_encryption_context(Some(context.to_hash_map()))
            .send()
            .await
            .map_err(|e| KmsError::GenerateFailed(DisplayErrorContext(&e).to_string()))?;

        let plaintext = output
            .plaintext()
            .ok_or_else(|| KmsError::GenerateFailed("no plaintext key returned".into()))?;
        let plaintext = to_key(plaintext.as_ref()).map_err(KmsError::GenerateFailed)?;
        let wrapped = output
            .ciphertext_blob()
            .ok_or_else(|| KmsError::GenerateFailed("no ciphertext blob returned".into()))?
            .as_ref()
            .to_vec();

        trace!(wrapped_len = wrapped.len(), "data key generated");
        Ok(DataKey { plaintext, wrapped })
    }

    async fn decrypt_data_key(
        &self,
        master_key: &str,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<PlaintextKey> {
        trace!(key_id = %master_key, wrapped_len = wrapped.len(), "decrypting data key with AWS KMS");

        let output = self
            .client
            .decrypt()
            .key_id(master_key)
            .ciphertext_blob(Blob::new(wrapped))
            .set_encryption_context(Some(context.to_hash_map()))
            .send()
            .await
            .map_err(|e| KmsError::DecryptFailed(DisplayErrorContext(&e).to_string()))?;

        let plaintext = output
            .plaintext()
            .ok_or_else(|| KmsError::DecryptFailed("no plaintext key returned".into()))?;
        to_key(plaintext.as_ref()).map_err(|e| KmsError::DecryptFailed(e).into())
    }
}

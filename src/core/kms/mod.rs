//! Key providers for envelope encryption.
//!
//! A [`KeyProvider`] generates a fresh data key per object and unwraps it
//! again at decrypt time. The master key never leaves the provider; callers
//! only see the plaintext data key (in a zeroizing buffer) and its wrapped
//! form.
//!
//! ## Providers
//!
//! - **aws**: Feature-gated (`aws`). AWS KMS `GenerateDataKey` / `Decrypt`.
//! - **local**: AES-256-GCM key wrapping under a secret read from a key file.
//! - **memory**: In-process stand-in for tests.
//!
//! ## Adding a New Provider
//!
//! 1. Implement the `KeyProvider` trait
//! 2. Add the implementation in a new file (e.g., `vault.rs`)
//! 3. Teach `KmsProvider::detect` its key reference format
//! 4. Wire it into `Keyring::from_config`

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::config::Config;
use crate::core::envelope::EncryptionContext;
use crate::error::{KmsError, Result};

#[cfg(feature = "aws")]
pub mod aws;
pub mod local;
pub mod memory;

pub use local::LocalKms;
pub use memory::MemoryKms;

/// Data key length in bytes (AES-256).
pub const DATA_KEY_LEN: usize = 32;

/// Plaintext data key, zeroed on drop.
pub type PlaintextKey = Zeroizing<[u8; DATA_KEY_LEN]>;

/// A freshly generated data key in plaintext and wrapped form.
pub struct DataKey {
    /// Key used to encrypt the object. Never logged or persisted.
    pub plaintext: PlaintextKey,
    /// Key wrapped under the master key, stored in the ciphertext header.
    pub wrapped: Vec<u8>,
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey")
            .field("plaintext", &"[REDACTED]")
            .field("wrapped_len", &self.wrapped.len())
            .finish()
    }
}

/// Remote (or local) key-management capability.
///
/// Implemented by real providers and by in-memory stand-ins for testing.
#[async_trait]
pub trait KeyProvider: Send + Sync + std::fmt::Debug {
    /// Identifier written to the ciphertext header (`aws-kms`, `local`, ...).
    fn provider_id(&self) -> &'static str;

    /// Generate a data key wrapped under `master_key`, bound to `context`.
    ///
    /// # Errors
    ///
    /// Returns `KmsError::GenerateFailed` if the provider refuses or is unreachable.
    async fn generate_data_key(
        &self,
        master_key: &str,
        context: &EncryptionContext,
    ) -> Result<DataKey>;

    /// Unwrap a data key previously produced by `generate_data_key`.
    ///
    /// # Errors
    ///
    /// Returns `KmsError::DecryptFailed` when the key, master key or context
    /// do not match, or the provider is unavailable.
    async fn decrypt_data_key(
        &self,
        master_key: &str,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<PlaintextKey>;
}

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmsProvider {
    Aws,
    Local,
}

impl KmsProvider {
    /// Auto-detect provider from a master key reference.
    ///
    /// - `arn:aws:kms:...`, `alias/...`, `mrk-...` or a bare key UUID → AWS
    /// - `local:<name>` → Local
    pub fn detect(key: &str) -> Option<Self> {
        if key.starts_with("arn:aws:kms:") || key.starts_with("alias/") || key.starts_with("mrk-")
        {
            return Some(Self::Aws);
        }
        if is_key_uuid(key) {
            return Some(Self::Aws);
        }
        if key.strip_prefix("local:").is_some_and(|name| !name.is_empty()) {
            return Some(Self::Local);
        }
        None
    }

    /// Provider display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Local => "local",
        }
    }
}

fn is_key_uuid(key: &str) -> bool {
    key.len() == 36
        && key.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// A key provider bound to one master key reference.
#[derive(Debug, Clone)]
pub struct Keyring {
    provider: Arc<dyn KeyProvider>,
    master_key: String,
}

impl Keyring {
    /// Bind `provider` to `master_key`.
    pub fn new(provider: Arc<dyn KeyProvider>, master_key: impl Into<String>) -> Self {
        Self {
            provider,
            master_key: master_key.into(),
        }
    }

    /// Build the keyring named by configuration.
    ///
    /// Returns `Ok(None)` when no master key is configured; the pipeline
    /// reports that per invocation.
    pub async fn from_config(config: &Config) -> Result<Option<Self>> {
        let Ok(key) = config.master_key() else {
            debug!("no master key configured");
            return Ok(None);
        };

        let provider = KmsProvider::detect(key)
            .ok_or_else(|| KmsError::UnrecognizedKey(format!(
                "{}. Expected an AWS key ARN, alias/..., key id, or local:<name>",
                key
            )))?;
        debug!(provider = provider.name(), master_key = %key, "creating keyring");

        let backend: Arc<dyn KeyProvider> = match provider {
            KmsProvider::Local => {
                let path = config.kms.local_key_file.as_deref().ok_or(
                    crate::error::ConfigError::MissingField {
                        field: "kms.local_key_file",
                    },
                )?;
                Arc::new(LocalKms::from_file(path)?)
            }

            #[cfg(feature = "aws")]
            KmsProvider::Aws => Arc::new(aws::AwsKms::new(config.store.region.as_deref()).await),

            #[cfg(not(feature = "aws"))]
            KmsProvider::Aws => {
                return Err(crate::error::ConfigError::FeatureDisabled {
                    feature: "aws",
                    what: "AWS KMS".to_string(),
                }
                .into())
            }
        };

        Ok(Some(Self::new(backend, key)))
    }

    /// Master key reference.
    pub fn master_key(&self) -> &str {
        &self.master_key
    }

    /// Provider identifier.
    pub fn provider_id(&self) -> &'static str {
        self.provider.provider_id()
    }

    /// Generate a data key under this keyring's master key.
    pub async fn generate_data_key(&self, context: &EncryptionContext) -> Result<DataKey> {
        self.provider
            .generate_data_key(&self.master_key, context)
            .await
    }

    /// Unwrap a data key under this keyring's master key.
    pub async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<PlaintextKey> {
        self.provider
            .decrypt_data_key(&self.master_key, wrapped, context)
            .await
    }
}

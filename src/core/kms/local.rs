//! Local key provider.
//!
//! Wraps data keys with AES-256-GCM under a 32-byte master secret read from
//! a hex key file. Intended for development and self-hosted stores where no
//! cloud KMS is available. Master key references look like `local:<name>`;
//! the name is bound into every wrapped key, so a key wrapped for
//! `local:a` does not unwrap as `local:b` even with the same secret.
//!
//! Wrapped key layout: `nonce (12) || ciphertext (32) || tag (16)`.

use std::fs;
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use rand::RngCore;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use super::{DataKey, KeyProvider, PlaintextKey, DATA_KEY_LEN};
use crate::core::envelope::EncryptionContext;
use crate::error::{KmsError, Result};

const NONCE_LEN: usize = 12;
const WRAPPED_LEN: usize = NONCE_LEN + DATA_KEY_LEN + 16;

/// Key provider backed by a local master secret
pub struct LocalKms {
    secret: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for LocalKms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKms").finish_non_exhaustive()
    }
}

impl LocalKms {
    /// Create a provider from raw secret bytes.
    pub fn new(secret: [u8; 32]) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }

    /// Load the master secret from a hex key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading local master key");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = fs::metadata(path) {
                let mode = meta.permissions().mode() & 0o777;
                if mode & 0o077 != 0 {
                    warn!(
                        path = %path.display(),
                        mode = %format!("{:o}", mode),
                        "insecure key file permissions"
                    );
                }
            }
        }

        let contents = Zeroizing::new(fs::read_to_string(path).map_err(KmsError::ReadKeyFile)?);
        let bytes = Zeroizing::new(
            hex::decode(contents.trim())
                .map_err(|e| KmsError::InvalidKeyFile(format!("not hex: {}", e)))?,
        );
        let secret: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            KmsError::InvalidKeyFile(format!("expected 32 bytes, got {}", bytes.len()))
        })?;

        Ok(Self::new(secret))
    }

    /// Generate a new random master secret and write it to `path` (0600 on Unix).
    ///
    /// Refuses to overwrite an existing file.
    pub fn generate_key_file(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(KmsError::InvalidKeyFile(format!(
                "{} already exists",
                path.display()
            ))
            .into());
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(secret.as_mut());
        let encoded = Zeroizing::new(hex::encode(secret.as_ref()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("{}\n", encoded.as_str()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), "local master key written");
        Ok(())
    }
}

/// Additional data binding a wrapped key to its master key and context.
fn wrap_aad(master_key: &str, context: &EncryptionContext) -> Vec<u8> {
    let mut aad = Vec::with_capacity(master_key.len() + 64);
    aad.extend_from_slice(master_key.as_bytes());
    aad.push(0);
    aad.extend_from_slice(&context.canonical_bytes());
    aad
}

/// Wrap `data_key` under `secret`.
pub(crate) fn wrap_key(
    secret: &[u8; 32],
    master_key: &str,
    data_key: &[u8; DATA_KEY_LEN],
    context: &EncryptionContext,
) -> std::result::Result<Vec<u8>, String> {
    let cipher = Aes256Gcm::new_from_slice(secret).map_err(|e| e.to_string())?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let aad = wrap_aad(master_key, context);
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: data_key,
                aad: &aad,
            },
        )
        .map_err(|e| e.to_string())?;

    let mut wrapped = Vec::with_capacity(WRAPPED_LEN);
    wrapped.extend_from_slice(&nonce);
    wrapped.extend_from_slice(&sealed);
    Ok(wrapped)
}

/// Unwrap a key produced by [`wrap_key`].
pub(crate) fn unwrap_key(
    secret: &[u8; 32],
    master_key: &str,
    wrapped: &[u8],
    context: &EncryptionContext,
) -> std::result::Result<PlaintextKey, String> {
    if wrapped.len() != WRAPPED_LEN {
        return Err(format!(
            "wrapped key is {} bytes, expected {}",
            wrapped.len(),
            WRAPPED_LEN
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(secret).map_err(|e| e.to_string())?;
    let (nonce, sealed) = wrapped.split_at(NONCE_LEN);
    let aad = wrap_aad(master_key, context);
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| "wrong master key or encryption context".to_string())?,
    );

    let mut key = Zeroizing::new([0u8; DATA_KEY_LEN]);
    key.copy_from_slice(&plaintext);
    Ok(key)
}

/// Fresh random data key.
pub(crate) fn random_data_key() -> PlaintextKey {
    let mut key = Zeroizing::new([0u8; DATA_KEY_LEN]);
    rand::thread_rng().fill_bytes(key.as_mut());
    key
}

#[async_trait]
impl KeyProvider for LocalKms {
    fn provider_id(&self) -> &'static str {
        "local"
    }

    async fn generate_data_key(
        &self,
        master_key: &str,
        context: &EncryptionContext,
    ) -> Result<DataKey> {
        trace!(master_key = %master_key, "generating local data key");
        let plaintext = random_data_key();
        let wrapped =
            wrap_key(&self.secret, master_key, &plaintext, context).map_err(KmsError::GenerateFailed)?;
        Ok(DataKey { plaintext, wrapped })
    }

    async fn decrypt_data_key(
        &self,
        master_key: &str,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<PlaintextKey> {
        trace!(master_key = %master_key, wrapped_len = wrapped.len(), "unwrapping local data key");
        unwrap_key(&self.secret, master_key, wrapped, context).map_err(|e| KmsError::DecryptFailed(e).into())
    }
}

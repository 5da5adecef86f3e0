//! In-memory key provider for tests.
//!
//! Wraps keys like [`LocalKms`](super::LocalKms) under a fixed secret, counts
//! calls, and can be told to fail so error paths can be exercised without a
//! real key service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::local::{random_data_key, unwrap_key, wrap_key};
use super::{DataKey, KeyProvider, PlaintextKey};
use crate::core::envelope::EncryptionContext;
use crate::error::{KmsError, Result};

const SECRET: [u8; 32] = *b"s3seal-memory-kms-fixed-secret!!";

/// Deterministic in-process key provider
#[derive(Debug, Default)]
pub struct MemoryKms {
    generated: AtomicUsize,
    decrypted: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `generate_data_key` calls.
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    /// Number of successful `decrypt_data_key` calls.
    pub fn decrypted(&self) -> usize {
        self.decrypted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyProvider for MemoryKms {
    fn provider_id(&self) -> &'static str {
        "memory"
    }

    async fn generate_data_key(
        &self,
        master_key: &str,
        context: &EncryptionContext,
    ) -> Result<DataKey> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KmsError::GenerateFailed("memory kms unavailable".to_string()).into());
        }
        let plaintext = random_data_key();
        let wrapped =
            wrap_key(&SECRET, master_key, &plaintext, context).map_err(KmsError::GenerateFailed)?;
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(DataKey { plaintext, wrapped })
    }

    async fn decrypt_data_key(
        &self,
        master_key: &str,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<PlaintextKey> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KmsError::DecryptFailed("memory kms unavailable".to_string()).into());
        }
        let key = unwrap_key(&SECRET, master_key, wrapped, context).map_err(KmsError::DecryptFailed)?;
        self.decrypted.fetch_add(1, Ordering::SeqCst);
        Ok(key)
    }
}

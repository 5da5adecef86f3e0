//! The fixed algorithm suite.
//!
//! AES-256-GCM with 12-byte IVs and 16-byte tags, an HKDF-SHA512 derived
//! frame key and a 32-byte key commitment. Suites are not negotiated; a
//! header naming any other id is rejected.

use hkdf::Hkdf;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::{EnvelopeError, Result};

/// AES-GCM IV length.
pub const IV_LEN: usize = 12;

/// AES-GCM tag length.
pub const TAG_LEN: usize = 16;

/// Message id length; also the HKDF salt.
pub const MESSAGE_ID_LEN: usize = 32;

/// Key commitment length.
pub const COMMITMENT_LEN: usize = 32;

/// Supported algorithm suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    /// `AES256_GCM_IV12_TAG16_HKDF_SHA512_COMMIT_KEY`
    Aes256GcmHkdfSha512CommitKey,
}

/// Frame key and commitment derived from a data key.
pub struct DerivedKey {
    pub key: Zeroizing<[u8; 32]>,
    pub commitment: [u8; COMMITMENT_LEN],
}

impl Suite {
    /// The one suite this codec writes.
    pub const DEFAULT: Suite = Suite::Aes256GcmHkdfSha512CommitKey;

    /// Wire identifier.
    pub fn id(self) -> u16 {
        match self {
            Self::Aes256GcmHkdfSha512CommitKey => 0x0578,
        }
    }

    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            0x0578 => Ok(Self::Aes256GcmHkdfSha512CommitKey),
            other => Err(EnvelopeError::UnsupportedSuite(other).into()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Aes256GcmHkdfSha512CommitKey => "AES256_GCM_IV12_TAG16_HKDF_SHA512_COMMIT_KEY",
        }
    }

    /// Derive the frame key and commitment for one message.
    pub fn derive(self, data_key: &[u8; 32], message_id: &[u8; MESSAGE_ID_LEN]) -> Result<DerivedKey> {
        let hk = Hkdf::<Sha512>::new(Some(message_id), data_key);

        let mut key = Zeroizing::new([0u8; 32]);
        hk.expand(&self.info(b"DERIVEKEY"), key.as_mut())
            .map_err(|e| EnvelopeError::EncryptionFailed(format!("HKDF expand failed: {}", e)))?;

        let mut commitment = [0u8; COMMITMENT_LEN];
        hk.expand(&self.info(b"COMMITKEY"), &mut commitment)
            .map_err(|e| EnvelopeError::EncryptionFailed(format!("HKDF expand failed: {}", e)))?;

        Ok(DerivedKey { key, commitment })
    }

    fn info(self, label: &[u8]) -> Vec<u8> {
        let mut info = Vec::with_capacity(2 + label.len());
        info.extend_from_slice(&self.id().to_be_bytes());
        info.extend_from_slice(label);
        info
    }
}

impl DerivedKey {
    /// Check `stored` against the derived commitment in constant time.
    pub fn verify_commitment(&self, stored: &[u8; COMMITMENT_LEN]) -> Result<()> {
        let diff = self
            .commitment
            .iter()
            .zip(stored.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 {
            Ok(())
        } else {
            Err(EnvelopeError::CommitmentMismatch.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_id_roundtrip() {
        let suite = Suite::DEFAULT;
        assert_eq!(suite.id(), 0x0578);
        assert_eq!(Suite::from_id(0x0578).unwrap(), suite);
        assert!(Suite::from_id(0x0178).is_err());
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = Suite::DEFAULT.derive(&[1; 32], &[2; 32]).unwrap();
        let b = Suite::DEFAULT.derive(&[1; 32], &[2; 32]).unwrap();
        assert_eq!(*a.key, *b.key);
        assert_eq!(a.commitment, b.commitment);
        assert_ne!(*a.key, a.commitment);
    }

    #[test]
    fn test_message_id_changes_key() {
        let a = Suite::DEFAULT.derive(&[1; 32], &[2; 32]).unwrap();
        let b = Suite::DEFAULT.derive(&[1; 32], &[3; 32]).unwrap();
        assert_ne!(*a.key, *b.key);
        assert_ne!(a.commitment, b.commitment);
    }

    #[test]
    fn test_verify_commitment() {
        let d = Suite::DEFAULT.derive(&[7; 32], &[8; 32]).unwrap();
        assert!(d.verify_commitment(&d.commitment).is_ok());
        let mut bad = d.commitment;
        bad[31] ^= 1;
        assert!(d.verify_commitment(&bad).is_err());
    }
}

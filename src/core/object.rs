//! Object reference type.
//!
//! Identifies one stored object by bucket and key.

use crate::core::constants::ENCRYPTED_SUFFIX;

/// A bucket/key pair naming a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    bucket: String,
    key: String,
}

impl ObjectRef {
    /// Create a new object reference
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this key already names an encrypted object.
    pub fn is_encrypted(&self) -> bool {
        self.key.ends_with(ENCRYPTED_SUFFIX)
    }

    /// Reference to the encrypted counterpart in the same bucket.
    pub fn encrypted(&self) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: format!("{}{}", self.key, ENCRYPTED_SUFFIX),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

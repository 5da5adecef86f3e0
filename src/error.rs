//! Error types.
//!
//! One enum per concern, nested into [`Error`] so every layer can use `?`
//! and the CLI can still match on the specific failure.

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kms(#[from] KmsError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("master key reference is not configured (set S3SEAL_KMS_KEY or kms.key)")]
    MissingMasterKey,

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("pipeline unavailable: {0}")]
    Unavailable(String),

    #[error("{what} requires the `{feature}` feature. Rebuild with: cargo install s3seal --features {feature}")]
    FeatureDisabled {
        feature: &'static str,
        what: String,
    },
}

/// Key provider errors.
#[derive(Error, Debug)]
pub enum KmsError {
    #[error("unrecognized master key reference: {0}")]
    UnrecognizedKey(String),

    #[error("data key generation failed: {0}")]
    GenerateFailed(String),

    #[error("data key decryption failed: {0}")]
    DecryptFailed(String),

    #[error("invalid local key file: {0}")]
    InvalidKeyFile(String),

    #[error("failed to read local key file: {0}")]
    ReadKeyFile(#[source] std::io::Error),
}

/// Ciphertext format and authentication errors.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("not an s3seal ciphertext (bad magic)")]
    BadMagic,

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported algorithm suite: {0:#06x}")]
    UnsupportedSuite(u16),

    #[error("malformed header: {0}")]
    Malformed(String),

    #[error("{field} too long for header: {len} bytes")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("encryption context does not match the ciphertext")]
    ContextMismatch,

    #[error("key commitment mismatch")]
    CommitmentMismatch,

    #[error("header authentication failed")]
    HeaderAuthFailed,

    #[error("frame {sequence} failed authentication")]
    FrameAuthFailed { sequence: u32 },

    #[error("frame out of order: expected {expected}, found {found}")]
    OutOfOrder { expected: u32, found: u32 },

    #[error("ciphertext is truncated")]
    Truncated,

    #[error("unexpected data after final frame")]
    TrailingData,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("io error in ciphertext stream: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for EnvelopeError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

/// Object storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("source returned a body that is not a readable byte stream: {0}")]
    BodyNotStream(String),

    #[error("invalid object reference: {0}")]
    InvalidReference(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Event notification parsing errors.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("invalid event notification: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid object key encoding: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, Error>;

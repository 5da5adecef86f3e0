//! Constants used throughout s3seal.
//!
//! Centralizes names and sizes that other components depend on.

/// Suffix appended to a source key to name its encrypted counterpart.
///
/// Also the idempotency marker: keys carrying it are never re-encrypted.
/// Changing it breaks already-deployed triggers.
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// Encryption context entry naming the encrypted object key.
pub const CONTEXT_KEY: &str = "key";

/// Default plaintext bytes per ciphertext frame.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Smallest accepted frame size.
pub const MIN_FRAME_SIZE: usize = 1024;

/// Largest accepted frame size.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default multipart upload part size (8 MiB).
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Smallest part size S3 accepts for every part but the last (5 MiB).
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Slots in each bounded channel between pipeline stages.
pub const PIPELINE_DEPTH: usize = 4;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "S3SEAL_LOG";

/// Environment variable holding the config file path.
pub const CONFIG_ENV: &str = "S3SEAL_CONFIG";

/// Environment variable holding the master key reference.
pub const KMS_KEY_ENV: &str = "S3SEAL_KMS_KEY";

/// Master key variable read by earlier deployments.
pub const LEGACY_KMS_KEY_ENV: &str = "KMS_KEY";

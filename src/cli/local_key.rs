//! Local master key generation.

use std::path::Path;

use crate::cli::output;
use crate::core::constants::KMS_KEY_ENV;
use crate::core::kms::LocalKms;
use crate::error::Result;

/// Write a fresh master key to `path`.
pub fn execute(path: &Path) -> Result<()> {
    LocalKms::generate_key_file(path)?;
    output::success(&format!("wrote master key to {}", output::path(path.display())));
    output::hint(&format!("export {}=local:default", KMS_KEY_ENV));
    output::hint(&format!("export S3SEAL_LOCAL_KEY_FILE={}", path.display()));
    Ok(())
}

//! Decrypt command.

use std::path::Path;

use tracing::debug;

use crate::cli::output;
use crate::core::config::Config;
use crate::core::envelope::{decrypt_stream, EncryptionContext};
use crate::core::kms::Keyring;
use crate::core::object::ObjectRef;
use crate::core::store::{self, SourceBody};
use crate::error::{ConfigError, Result, StoreError};

/// Decrypt an encrypted object to `dest`, or stdout when `dest` is `None`.
///
/// A partially written `dest` is removed if authentication fails.
pub async fn execute(config: &Config, bucket: &str, key: &str, dest: Option<&Path>) -> Result<()> {
    let object = ObjectRef::new(bucket, key);
    if !object.is_encrypted() {
        output::warn(&format!("{} does not end in .encrypted", object));
    }

    let keyring = Keyring::from_config(config)
        .await?
        .ok_or(ConfigError::MissingMasterKey)?;
    let store = store::from_config(config).await?;

    let SourceBody::Stream(mut reader) = store.get(&object).await? else {
        return Err(StoreError::BodyNotStream(object.to_string()).into());
    };
    let context = EncryptionContext::for_object(&object);

    let Some(path) = dest else {
        let mut stdout = tokio::io::stdout();
        let n = decrypt_stream(&mut reader, &mut stdout, &keyring, &context).await?;
        debug!(object = %object, bytes = n, "decrypted to stdout");
        return Ok(());
    };

    let mut file = tokio::fs::File::create(path).await?;
    match decrypt_stream(&mut reader, &mut file, &keyring, &context).await {
        Ok(n) => {
            output::success(&format!(
                "decrypted {} to {} ({} bytes)",
                output::path(&object),
                output::path(path.display()),
                n
            ));
            Ok(())
        }
        Err(e) => {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %rm, "could not remove partial output");
            }
            Err(e)
        }
    }
}

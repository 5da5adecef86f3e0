//! Encrypt command.

use crate::cli::output;
use crate::core::config::Config;
use crate::core::object::ObjectRef;
use crate::core::pipeline::Outcome;
use crate::error::Result;

/// Print an outcome for a person at a terminal.
pub(crate) fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Skipped { object } => {
            output::kv("skipped:", format!("{} (already encrypted)", output::path(object)));
        }
        Outcome::Encrypted {
            source,
            target,
            bytes_in,
            bytes_out,
            source_deleted,
        } => {
            output::success(&format!(
                "encrypted {} -> {} ({} -> {} bytes)",
                output::path(source),
                output::path(target),
                bytes_in,
                bytes_out
            ));
            if !source_deleted {
                output::warn(&format!("{} could not be deleted; both copies remain", source));
            }
        }
        Outcome::Failed {
            object,
            stage,
            error,
            ..
        } => {
            output::error(&format!("{} failed at {} stage: {}", object, stage, error));
        }
    }
}

/// Encrypt one object and replace it.
pub async fn execute(config: &Config, bucket: &str, key: &str) -> Result<()> {
    let pipeline = super::build_pipeline(config).await?;
    let outcome = pipeline.run(&ObjectRef::new(bucket, key)).await;
    report(&outcome);

    match outcome {
        Outcome::Failed { error, .. } => Err(error),
        _ => Ok(()),
    }
}

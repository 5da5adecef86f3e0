//! Event handler command.
//!
//! Each record of the notification is processed as an independent
//! invocation. Failures, including a pipeline that cannot be set up from
//! configuration, are logged and reported but never turned into an error
//! exit, so the invoking mechanism does not retry. Only an unreadable event
//! fails the command.

use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use crate::cli::encrypt::report;
use crate::cli::output;
use crate::core::config::Config;
use crate::core::event::Notification;
use crate::core::pipeline::Outcome;
use crate::error::Result;

/// Read the event JSON from a file, or stdin for `-`.
async fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut json = String::new();
        tokio::io::stdin().read_to_string(&mut json).await?;
        Ok(json)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

/// Process every record of an event notification.
pub async fn execute(config: Result<Config>, event: &str) -> Result<()> {
    let notification = Notification::parse(&read_event(event).await?)?;
    if notification.records.is_empty() {
        warn!("event notification contains no records");
        output::warn("event notification contains no records");
        return Ok(());
    }

    let pipeline = match config {
        Ok(config) => super::build_pipeline(&config).await,
        Err(e) => Err(e),
    };
    let pipeline = pipeline.map_err(|e| {
        error!(error = %e, "pipeline setup failed");
        e.to_string()
    });

    let mut failed = 0usize;
    for (index, record) in notification.records.iter().enumerate() {
        let object = match record.object() {
            Ok(object) => object,
            Err(e) => {
                error!(record = index, key = %record.s3.object.key, error = %e, "invalid record");
                output::error(&format!("record {}: {}", index, e));
                failed += 1;
                continue;
            }
        };

        let outcome = match &pipeline {
            Ok(pipeline) => pipeline.run(&object).await,
            Err(reason) => Outcome::unavailable(&object, reason),
        };
        if !outcome.is_success() {
            failed += 1;
        }
        report(&outcome);
    }

    info!(
        records = notification.records.len(),
        failed, "event handled"
    );
    Ok(())
}

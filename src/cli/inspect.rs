//! Inspect command.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::cli::output;
use crate::core::envelope::read_header;
use crate::error::Result;

/// Print the header of a local encrypted file. No key is needed.
pub async fn execute(path: &Path, json: bool) -> Result<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let parsed = read_header(&mut file).await?;
    let header = &parsed.header;

    if json {
        let context: serde_json::Map<String, serde_json::Value> = header
            .context
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
            .collect();
        let doc = serde_json::json!({
            "suite": header.suite.name(),
            "suite_id": header.suite.id(),
            "provider": header.provider_id,
            "master_key": header.master_key,
            "message_id": hex::encode(header.message_id),
            "context": context,
            "frame_size": header.frame_len,
            "header_size": parsed.encoded_len(),
            "wrapped_key": BASE64.encode(&header.wrapped_key),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    output::header(&output::path(path.display()));
    output::kv(
        "suite:      ",
        format!("{} ({:#06x})", header.suite.name(), header.suite.id()),
    );
    output::kv("provider:   ", &header.provider_id);
    output::kv("master key: ", &header.master_key);
    output::kv("message id: ", hex::encode(header.message_id));
    output::kv("frame size: ", header.frame_len);
    output::kv("header size:", parsed.encoded_len());
    output::kv("wrapped key:", BASE64.encode(&header.wrapped_key));
    if header.context.is_empty() {
        output::kv("context:    ", "(empty)");
    }
    for (k, v) in header.context.iter() {
        output::kv("context:    ", format!("{}={}", k, v));
    }
    Ok(())
}

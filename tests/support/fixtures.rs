//! Test fixtures and constants.

/// Bucket used by most tests.
pub const BUCKET: &str = "uploads";

/// Plaintext spanning several default-size frames with a short tail.
pub fn sample_payload() -> Vec<u8> {
    (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect()
}

/// Build an object-created notification for `(bucket, raw_key)` pairs.
///
/// Keys are inserted as given, so callers pass them already URL-encoded.
pub fn event_json(records: &[(&str, &str)]) -> String {
    let records: Vec<serde_json::Value> = records
        .iter()
        .map(|(bucket, key)| {
            serde_json::json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": bucket },
                    "object": { "key": key, "size": 1 }
                }
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}

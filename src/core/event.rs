//! Object-created event notifications.
//!
//! Parses the S3 event notification JSON and turns each record into an
//! [`ObjectRef`]. Keys arrive URL-encoded with `+` standing for a space.

use serde::Deserialize;
use tracing::debug;

use crate::core::object::ObjectRef;
use crate::error::{EventError, Result};

/// An S3 event notification.
#[derive(Debug, Deserialize)]
pub struct Notification {
    #[serde(rename = "Records", default)]
    pub records: Vec<Record>,
}

/// One record of a notification.
#[derive(Debug, Deserialize)]
pub struct Record {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntity {
    /// URL-encoded object key
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl Notification {
    /// Parse notification JSON.
    pub fn parse(json: &str) -> Result<Self> {
        let notification: Self = serde_json::from_str(json).map_err(EventError::Parse)?;
        debug!(records = notification.records.len(), "parsed notification");
        Ok(notification)
    }
}

impl Record {
    /// Decoded object reference for this record.
    pub fn object(&self) -> Result<ObjectRef> {
        let key = decode_key(&self.s3.object.key)?;
        Ok(ObjectRef::new(self.s3.bucket.name.clone(), key))
    }
}

/// Decode an event object key: `+` becomes a space, then percent-decoding.
pub fn decode_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|k| k.into_owned())
        .map_err(|e| EventError::Decode(format!("{}: {}", raw, e)).into())
}

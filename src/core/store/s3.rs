//! Amazon S3 object store.
//!
//! Enable with `--features aws`. Uploads use the multipart API: written
//! bytes are buffered up to one part and sent as soon as a part is full, so
//! memory stays at one part regardless of object size. A custom endpoint
//! switches to path-style addressing for S3-compatible services.
//!
//! S3 allows at most 10,000 parts per upload. The part size grows by the
//! configured size every 1,000 parts, so with the default 8 MiB the upload
//! holds about 430 GiB; past the last part the write fails and the upload
//! is aborted.

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use super::{ObjectStore, SourceBody, Upload};
use crate::core::config::StoreConfig;
use crate::core::object::ObjectRef;
use crate::error::{Result, StoreError};

/// Most parts S3 accepts in one multipart upload.
const MAX_PARTS: usize = 10_000;

/// Parts sent before the part size grows by another `base`.
const PARTS_PER_STEP: usize = 1_000;

/// Size of part `index` (zero-based) for a configured part size of `base`.
fn part_size_at(base: usize, index: usize) -> usize {
    base * (1 + index / PARTS_PER_STEP)
}

/// The SDK always hands back a byte stream, empty objects included.
fn source_body(output: GetObjectOutput) -> SourceBody {
    SourceBody::Stream(Box::pin(output.body.into_async_read()))
}

/// S3-backed object store
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    part_size: usize,
}

impl S3Store {
    /// Build a client from the default AWS configuration and `config`.
    pub async fn new(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            debug!(endpoint = %endpoint, "using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(Client::from_conf(builder.build()), config.part_size)
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, part_size: usize) -> Self {
        Self { client, part_size }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn get(&self, object: &ObjectRef) -> Result<SourceBody> {
        let output = self
            .client
            .get_object()
            .bucket(object.bucket())
            .key(object.key())
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                if e.is_no_such_key() {
                    StoreError::NotFound(object.to_string())
                } else {
                    StoreError::ReadFailed(format!("{}: {}", object, DisplayErrorContext(&e)))
                }
            })?;

        trace!(object = %object, size = ?output.content_length(), "opened source object");
        Ok(source_body(output))
    }

    async fn start_upload(&self, object: &ObjectRef) -> Result<Box<dyn Upload>> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(object.bucket())
            .key(object.key())
            .content_type("application/octet-stream")
            .send()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", object, DisplayErrorContext(&e))))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StoreError::WriteFailed(format!("{}: CreateMultipartUpload returned no upload id", object))
            })?
            .to_string();

        debug!(object = %object, upload_id = %upload_id, "started multipart upload");
        Ok(Box::new(S3Upload {
            client: self.client.clone(),
            object: object.clone(),
            upload_id,
            part_size: self.part_size,
            buffer: BytesMut::with_capacity(self.part_size),
            parts: Vec::new(),
        }))
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        self.client
            .delete_object()
            .bucket(object.bucket())
            .key(object.key())
            .send()
            .await
            .map_err(|e| StoreError::DeleteFailed(format!("{}: {}", object, DisplayErrorContext(&e))))?;
        Ok(())
    }
}

struct S3Upload {
    client: Client,
    object: ObjectRef,
    upload_id: String,
    part_size: usize,
    buffer: BytesMut,
    parts: Vec<CompletedPart>,
}

impl S3Upload {
    /// Size of the next part to send.
    fn next_part_size(&self) -> usize {
        part_size_at(self.part_size, self.parts.len())
    }

    async fn send_part(&mut self, body: Bytes) -> Result<()> {
        if self.parts.len() >= MAX_PARTS {
            return Err(StoreError::WriteFailed(format!(
                "{}: object exceeds the {} part multipart limit",
                self.object, MAX_PARTS
            ))
            .into());
        }
        let part_number = self.parts.len() as i32 + 1;
        let len = body.len();
        let output = self
            .client
            .upload_part()
            .bucket(self.object.bucket())
            .key(self.object.key())
            .upload_id(&self.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                StoreError::WriteFailed(format!(
                    "{} part {}: {}",
                    self.object,
                    part_number,
                    DisplayErrorContext(&e)
                ))
            })?;

        trace!(part_number, len, "uploaded part");
        self.parts.push(
            CompletedPart::builder()
                .set_e_tag(output.e_tag().map(str::to_string))
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }

    async fn abort_remote(&self) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(self.object.bucket())
            .key(self.object.key())
            .upload_id(&self.upload_id)
            .send()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", self.object, DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if !self.buffer.is_empty() || self.parts.is_empty() {
            let rest = self.buffer.split().freeze();
            self.send_part(rest).await?;
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(self.object.bucket())
            .key(self.object.key())
            .upload_id(&self.upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", self.object, DisplayErrorContext(&e))))?;
        Ok(())
    }
}

#[async_trait]
impl Upload for S3Upload {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);
        while self.buffer.len() >= self.next_part_size() {
            let size = self.next_part_size();
            let part = self.buffer.split_to(size).freeze();
            self.send_part(part).await?;
        }
        Ok(())
    }

    async fn complete(mut self: Box<Self>) -> Result<()> {
        if let Err(e) = self.finish().await {
            warn!(object = %self.object, error = %e, "completing multipart upload failed, aborting");
            if let Err(abort) = self.abort_remote().await {
                warn!(object = %self.object, error = %abort, "abort after failed completion failed");
            }
            return Err(e);
        }
        debug!(object = %self.object, "multipart upload completed");
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.abort_remote().await?;
        debug!(object = %self.object, parts = self.parts.len(), "multipart upload aborted");
        Ok(())
    }
}

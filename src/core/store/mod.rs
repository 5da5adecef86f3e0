//! Object storage.
//!
//! The pipeline reads the source object, streams the ciphertext into a
//! multipart upload and deletes the source, all through [`ObjectStore`].
//!
//! ## Backends
//!
//! - **s3**: Feature-gated (`aws`). Amazon S3 or any S3-compatible endpoint.
//! - **fs**: A local directory with one subdirectory per bucket.
//! - **memory**: In-process store with call recording and fault injection,
//!   for tests.
//!
//! ## Adding a New Storage Backend
//!
//! 1. Implement `ObjectStore` and `Upload`
//! 2. Add the implementation in a new file (e.g., `gcs.rs`)
//! 3. Add a `StoreBackend` variant and wire it into `from_config`

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::core::object::ObjectRef;
use crate::error::Result;

mod backend;
pub mod fs;
pub mod memory;
#[cfg(feature = "aws")]
pub mod s3;

pub use backend::from_config;
pub use fs::FsStore;
pub use memory::{Call, Faults, MemoryStore};

/// Sequential, single-pass object body.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// What a backend returned for a read.
pub enum SourceBody {
    /// A readable byte stream
    Stream(ByteReader),
    /// The object exists but the backend has no consumable body for it
    Absent,
}

impl std::fmt::Debug for SourceBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("SourceBody::Stream(..)"),
            Self::Absent => f.write_str("SourceBody::Absent"),
        }
    }
}

/// Object storage primitives.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Open the object for reading.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    async fn get(&self, object: &ObjectRef) -> Result<SourceBody>;

    /// Begin a multipart upload to `object`.
    ///
    /// Nothing is visible at `object` until [`Upload::complete`] succeeds.
    async fn start_upload(&self, object: &ObjectRef) -> Result<Box<dyn Upload>>;

    /// Delete the object. Deleting a missing object succeeds.
    async fn delete(&self, object: &ObjectRef) -> Result<()>;
}

/// An in-progress upload of unknown total length.
#[async_trait]
pub trait Upload: Send {
    /// Append bytes. May block until the backend has room.
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Commit everything written. The object becomes visible only on success.
    async fn complete(self: Box<Self>) -> Result<()>;

    /// Discard everything written.
    async fn abort(self: Box<Self>) -> Result<()>;
}

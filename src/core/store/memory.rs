//! In-memory object store for tests.
//!
//! Records every call in order and can be told to fail at specific points,
//! so pipeline ordering and cleanup can be asserted without a real backend.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, ReadBuf};

use super::{ObjectStore, SourceBody, Upload};
use crate::core::object::ObjectRef;
use crate::error::{Result, StoreError};

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(ObjectRef),
    StartUpload(ObjectRef),
    Write { object: ObjectRef, len: usize },
    Complete(ObjectRef),
    Abort(ObjectRef),
    Delete(ObjectRef),
}

impl Call {
    /// Whether this call changes stored state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get(_))
    }
}

/// Failure switches.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `get` fails with a read error
    pub fail_get: bool,
    /// `get` reports an object without a readable body
    pub absent_body: bool,
    /// The body stream fails once this many bytes have been read
    pub fail_read_after: Option<usize>,
    /// `write` fails once this many writes have succeeded
    pub fail_write_after: Option<usize>,
    /// `complete` fails
    pub fail_complete: bool,
    /// `delete` fails
    pub fail_delete: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectRef, Bytes>,
    calls: Vec<Call>,
    faults: Faults,
}

/// Object store held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread cannot leave the map half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object directly, without recording a call.
    pub fn insert(&self, object: ObjectRef, data: impl Into<Bytes>) {
        self.lock().objects.insert(object, data.into());
    }

    /// Current contents of an object.
    pub fn object(&self, object: &ObjectRef) -> Option<Bytes> {
        self.lock().objects.get(object).cloned()
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.lock().objects.contains_key(object)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    fn record(&self, call: Call) -> Faults {
        let mut state = self.lock();
        state.calls.push(call);
        state.faults.clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, object: &ObjectRef) -> Result<SourceBody> {
        let faults = self.record(Call::Get(object.clone()));
        if faults.fail_get {
            return Err(StoreError::ReadFailed(format!("{}: injected failure", object)).into());
        }
        let data = self
            .object(object)
            .ok_or_else(|| StoreError::NotFound(object.to_string()))?;
        if faults.absent_body {
            return Ok(SourceBody::Absent);
        }
        if let Some(limit) = faults.fail_read_after {
            return Ok(SourceBody::Stream(Box::pin(FailingReader {
                data,
                pos: 0,
                limit,
            })));
        }
        Ok(SourceBody::Stream(Box::pin(std::io::Cursor::new(data))))
    }

    async fn start_upload(&self, object: &ObjectRef) -> Result<Box<dyn Upload>> {
        self.record(Call::StartUpload(object.clone()));
        Ok(Box::new(MemoryUpload {
            store: self.clone(),
            object: object.clone(),
            buffer: BytesMut::new(),
            writes: 0,
        }))
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        let faults = self.record(Call::Delete(object.clone()));
        if faults.fail_delete {
            return Err(StoreError::DeleteFailed(format!("{}: injected failure", object)).into());
        }
        self.lock().objects.remove(object);
        Ok(())
    }
}

/// Body that breaks off with an error after `limit` bytes, like a dropped
/// connection.
struct FailingReader {
    data: Bytes,
    pos: usize,
    limit: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.pos >= this.limit {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected read failure",
            )));
        }
        let end = this
            .data
            .len()
            .min(this.limit)
            .min(this.pos + buf.remaining());
        buf.put_slice(&this.data[this.pos..end]);
        this.pos = end;
        Poll::Ready(Ok(()))
    }
}

struct MemoryUpload {
    store: MemoryStore,
    object: ObjectRef,
    buffer: BytesMut,
    writes: usize,
}

#[async_trait]
impl Upload for MemoryUpload {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let faults = self.store.record(Call::Write {
            object: self.object.clone(),
            len: chunk.len(),
        });
        if faults.fail_write_after.is_some_and(|n| self.writes >= n) {
            return Err(StoreError::WriteFailed(format!("{}: injected failure", self.object)).into());
        }
        self.buffer.extend_from_slice(&chunk);
        self.writes += 1;
        Ok(())
    }

    async fn complete(self: Box<Self>) -> Result<()> {
        let faults = self.store.record(Call::Complete(self.object.clone()));
        if faults.fail_complete {
            return Err(StoreError::WriteFailed(format!("{}: injected failure", self.object)).into());
        }
        let MemoryUpload {
            store,
            object,
            buffer,
            ..
        } = *self;
        store.lock().objects.insert(object, buffer.freeze());
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.store.record(Call::Abort(self.object.clone()));
        Ok(())
    }
}

//! Encrypt-and-replace pipeline.
//!
//! For one object reference: skip it if it already names an encrypted
//! object, otherwise stream it through the envelope codec into a multipart
//! upload of `<key>.encrypted`, and delete the source once the upload has
//! completed.
//!
//! ```text
//! source reader --chunks--> codec --frames--> upload writer
//! ```
//!
//! The three stages run concurrently, joined by bounded channels of
//! [`PIPELINE_DEPTH`] slots, so a slow sink throttles the source read. When
//! a stage fails the remaining stages are dropped and the upload is aborted.
//!
//! [`Pipeline::run`] never returns an error: every failure is logged and
//! reported in the [`Outcome`].

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::constants::PIPELINE_DEPTH;
use crate::core::envelope::{begin_encryption, read_full, EncryptionContext, FrameSealer, Sealing};
use crate::core::kms::Keyring;
use crate::core::object::ObjectRef;
use crate::core::store::{ByteReader, ObjectStore, SourceBody, Upload};
use crate::error::{ConfigError, Error, StoreError};

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Invocation preconditions
    Config,
    /// Reading the source object
    Source,
    /// Key generation and framing
    Transform,
    /// Writing and completing the encrypted object
    Sink,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Config => "config",
            Self::Source => "source",
            Self::Transform => "transform",
            Self::Sink => "sink",
        })
    }
}

/// Progress of one invocation. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
    pub read_started: bool,
    pub write_completed: bool,
    pub delete_issued: bool,
}

/// Result of one invocation.
#[derive(Debug)]
pub enum Outcome {
    /// The key already names an encrypted object; nothing was touched.
    Skipped { object: ObjectRef },
    /// The encrypted object was written.
    Encrypted {
        source: ObjectRef,
        target: ObjectRef,
        bytes_in: u64,
        bytes_out: u64,
        /// False when the source delete failed and both objects remain
        source_deleted: bool,
    },
    /// Nothing was committed; the source is untouched.
    Failed {
        object: ObjectRef,
        stage: Stage,
        error: Error,
        state: TransferState,
    },
}

impl Outcome {
    /// Whether the invocation ended without a failure.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Outcome for an invocation whose pipeline could not be set up.
    ///
    /// An already-encrypted key is still skipped; anything else fails at the
    /// config stage without a storage call.
    pub fn unavailable(object: &ObjectRef, reason: &str) -> Self {
        if object.is_encrypted() {
            debug!(bucket = object.bucket(), key = object.key(), "already encrypted, skipping");
            return Self::Skipped {
                object: object.clone(),
            };
        }

        error!(
            bucket = object.bucket(),
            key = object.key(),
            stage = %Stage::Config,
            error = %reason,
            "encryption failed"
        );
        Self::Failed {
            object: object.clone(),
            stage: Stage::Config,
            error: ConfigError::Unavailable(reason.to_string()).into(),
            state: TransferState::default(),
        }
    }
}

struct Failure {
    stage: Stage,
    error: Error,
}

impl Failure {
    fn new(stage: Stage, error: impl Into<Error>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

fn at(stage: Stage) -> impl FnOnce(Error) -> Failure {
    move |error| Failure::new(stage, error)
}

/// Failure reported by a stage whose neighbour went away without finishing.
fn stage_closed(stage: Stage, what: &str) -> Failure {
    Failure::new(
        stage,
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, what.to_string()),
    )
}

/// Data passed between stages. `last` marks the end of the stream.
struct Chunk {
    data: Bytes,
    last: bool,
}

/// Encrypt-and-replace orchestrator
#[derive(Debug, Clone)]
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    keyring: Option<Keyring>,
    frame_size: usize,
}

impl Pipeline {
    /// Create a pipeline.
    ///
    /// `keyring` is `None` when no master key is configured; every
    /// invocation then fails at the config stage without touching storage.
    pub fn new(store: Arc<dyn ObjectStore>, keyring: Option<Keyring>, frame_size: usize) -> Self {
        Self {
            store,
            keyring,
            frame_size,
        }
    }

    /// Process one object reference.
    pub async fn run(&self, object: &ObjectRef) -> Outcome {
        if object.is_encrypted() {
            debug!(bucket = object.bucket(), key = object.key(), "already encrypted, skipping");
            return Outcome::Skipped {
                object: object.clone(),
            };
        }

        let mut state = TransferState::default();
        match self.replace(object, &mut state).await {
            Ok(outcome) => outcome,
            Err(Failure { stage, error }) => {
                error!(
                    bucket = object.bucket(),
                    key = object.key(),
                    stage = %stage,
                    read_started = state.read_started,
                    write_completed = state.write_completed,
                    error = %error,
                    "encryption failed"
                );
                Outcome::Failed {
                    object: object.clone(),
                    stage,
                    error,
                    state,
                }
            }
        }
    }

    async fn replace(
        &self,
        object: &ObjectRef,
        state: &mut TransferState,
    ) -> std::result::Result<Outcome, Failure> {
        let keyring = self
            .keyring
            .as_ref()
            .ok_or_else(|| Failure::new(Stage::Config, ConfigError::MissingMasterKey))?;
        let target = object.encrypted();

        let body = self.store.get(object).await.map_err(at(Stage::Source))?;
        state.read_started = true;
        let SourceBody::Stream(reader) = body else {
            return Err(Failure::new(
                Stage::Source,
                StoreError::BodyNotStream(object.to_string()),
            ));
        };

        let context = EncryptionContext::for_object(&target);
        let Sealing { header, sealer } = begin_encryption(keyring, &context, self.frame_size)
            .await
            .map_err(at(Stage::Transform))?;

        let mut upload = self
            .store
            .start_upload(&target)
            .await
            .map_err(at(Stage::Sink))?;
        debug!(
            bucket = object.bucket(),
            key = object.key(),
            encrypted_key = target.key(),
            store = self.store.name(),
            "streaming"
        );

        let (plain_tx, plain_rx) = mpsc::channel(PIPELINE_DEPTH);
        let (sealed_tx, sealed_rx) = mpsc::channel(PIPELINE_DEPTH);
        let streamed = tokio::try_join!(
            read_source(reader, self.frame_size, plain_tx),
            seal_frames(header, sealer, plain_rx, sealed_tx),
            write_sink(upload.as_mut(), sealed_rx),
        );

        let (bytes_in, _, bytes_out) = match streamed {
            Ok(counts) => counts,
            Err(failure) => {
                if let Err(e) = upload.abort().await {
                    warn!(encrypted_key = target.key(), error = %e, "failed to abort upload");
                }
                return Err(failure);
            }
        };

        upload.complete().await.map_err(at(Stage::Sink))?;
        state.write_completed = true;
        info!(
            bucket = object.bucket(),
            key = object.key(),
            encrypted_key = target.key(),
            bytes_in,
            bytes_out,
            "encrypted object written"
        );

        state.delete_issued = true;
        let source_deleted = match self.store.delete(object).await {
            Ok(()) => {
                debug!(bucket = object.bucket(), key = object.key(), "source deleted");
                true
            }
            Err(e) => {
                warn!(
                    bucket = object.bucket(),
                    key = object.key(),
                    encrypted_key = target.key(),
                    error = %e,
                    "source delete failed, plaintext and encrypted objects both remain"
                );
                false
            }
        };

        Ok(Outcome::Encrypted {
            source: object.clone(),
            target,
            bytes_in,
            bytes_out,
            source_deleted,
        })
    }
}

/// Read the source in frame-sized chunks. A short chunk (possibly empty)
/// ends the stream.
async fn read_source(
    mut reader: ByteReader,
    frame_size: usize,
    tx: mpsc::Sender<Chunk>,
) -> std::result::Result<u64, Failure> {
    let mut total = 0u64;
    loop {
        let mut buf = vec![0u8; frame_size];
        let n = read_full(&mut reader, &mut buf)
            .await
            .map_err(|e| Failure::new(Stage::Source, StoreError::ReadFailed(e.to_string())))?;
        buf.truncate(n);
        total += n as u64;

        let last = n < frame_size;
        tx.send(Chunk {
            data: Bytes::from(buf),
            last,
        })
        .await
        .map_err(|_| stage_closed(Stage::Transform, "codec stopped before end of source"))?;
        if last {
            return Ok(total);
        }
    }
}

/// Emit the header, then one sealed frame per plaintext chunk.
async fn seal_frames(
    header: Bytes,
    mut sealer: FrameSealer,
    mut rx: mpsc::Receiver<Chunk>,
    tx: mpsc::Sender<Chunk>,
) -> std::result::Result<u64, Failure> {
    let closed = || stage_closed(Stage::Sink, "upload stopped before end of ciphertext");

    let mut total = header.len() as u64;
    tx.send(Chunk {
        data: header,
        last: false,
    })
    .await
    .map_err(|_| closed())?;

    while let Some(chunk) = rx.recv().await {
        let frame = sealer
            .seal(&chunk.data, chunk.last)
            .map_err(at(Stage::Transform))?;
        total += frame.len() as u64;
        tx.send(Chunk {
            data: frame,
            last: chunk.last,
        })
        .await
        .map_err(|_| closed())?;
        if chunk.last {
            return Ok(total);
        }
    }

    Err(stage_closed(Stage::Source, "source ended without end of stream"))
}

/// Write ciphertext into the upload until the final frame.
async fn write_sink(
    upload: &mut dyn Upload,
    mut rx: mpsc::Receiver<Chunk>,
) -> std::result::Result<u64, Failure> {
    let mut total = 0u64;
    while let Some(chunk) = rx.recv().await {
        total += chunk.data.len() as u64;
        upload.write(chunk.data).await.map_err(at(Stage::Sink))?;
        if chunk.last {
            return Ok(total);
        }
    }
    Err(stage_closed(Stage::Transform, "codec ended without final frame"))
}

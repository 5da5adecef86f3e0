//! Framed body encryption.
//!
//! The plaintext is cut into frames of `frame_len` bytes, each sealed on its
//! own with AES-256-GCM. Every frame but the last is exactly `frame_len`
//! bytes; the final frame is marked and carries its own length (possibly
//! zero). Sequence numbers start at 1 and are part of both the IV and the
//! additional data, so frames cannot be reordered, dropped or replayed from
//! another message.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::suite::{IV_LEN, MESSAGE_ID_LEN, TAG_LEN};
use crate::error::{EnvelopeError, Result};

/// Sequence value marking the final frame.
pub const FINAL_MARKER: u32 = u32::MAX;

/// IV for frame `sequence`: the sequence number left-padded with zeros.
fn frame_iv(sequence: u32) -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    iv[IV_LEN - 4..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

fn frame_aad(message_id: &[u8; MESSAGE_ID_LEN], last: bool, sequence: u32, len: usize) -> Vec<u8> {
    let mut aad = Vec::with_capacity(MESSAGE_ID_LEN + 5 + 4 + 8);
    aad.extend_from_slice(message_id);
    aad.extend_from_slice(if last { b"final" } else { b"frame" });
    aad.extend_from_slice(&sequence.to_be_bytes());
    aad.extend_from_slice(&(len as u64).to_be_bytes());
    aad
}

fn frame_cipher(key: &[u8; 32]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()).into())
}

/// Seals plaintext frames in order.
pub struct FrameSealer {
    cipher: Aes256Gcm,
    message_id: [u8; MESSAGE_ID_LEN],
    frame_len: usize,
    sequence: u32,
    finished: bool,
}

impl std::fmt::Debug for FrameSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSealer")
            .field("frame_len", &self.frame_len)
            .field("sequence", &self.sequence)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl FrameSealer {
    pub fn new(key: &[u8; 32], message_id: [u8; MESSAGE_ID_LEN], frame_len: usize) -> Result<Self> {
        Ok(Self {
            cipher: frame_cipher(key)?,
            message_id,
            frame_len,
            sequence: 1,
            finished: false,
        })
    }

    /// Plaintext bytes per regular frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Whether the final frame has been sealed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Seal one frame.
    ///
    /// A regular frame must be exactly `frame_len` bytes; the final frame may
    /// be shorter, including empty. Nothing can be sealed after the final
    /// frame.
    pub fn seal(&mut self, plaintext: &[u8], last: bool) -> Result<Bytes> {
        if self.finished {
            return Err(EnvelopeError::EncryptionFailed("frame sealed after final frame".into()).into());
        }
        if plaintext.len() > self.frame_len || (!last && plaintext.len() != self.frame_len) {
            return Err(EnvelopeError::EncryptionFailed(format!(
                "frame of {} bytes with frame length {}",
                plaintext.len(),
                self.frame_len
            ))
            .into());
        }
        if self.sequence == FINAL_MARKER {
            return Err(EnvelopeError::EncryptionFailed("too many frames".into()).into());
        }

        let sequence = self.sequence;
        let iv = frame_iv(sequence);
        let aad = frame_aad(&self.message_id, last, sequence, plaintext.len());
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;

        let mut out = BytesMut::with_capacity(4 + 4 + IV_LEN + 4 + sealed.len());
        if last {
            out.put_u32(FINAL_MARKER);
            out.put_u32(sequence);
            out.put_slice(&iv);
            out.put_u32(plaintext.len() as u32);
        } else {
            out.put_u32(sequence);
            out.put_slice(&iv);
        }
        out.put_slice(&sealed);

        trace!(sequence, last, len = plaintext.len(), "sealed frame");
        self.sequence += 1;
        self.finished = last;
        Ok(out.freeze())
    }
}

/// One opened frame.
#[derive(Debug)]
pub struct OpenedFrame {
    pub plaintext: Vec<u8>,
    pub last: bool,
}

/// Reads and authenticates frames in order.
pub struct FrameOpener {
    cipher: Aes256Gcm,
    message_id: [u8; MESSAGE_ID_LEN],
    frame_len: usize,
    expected: u32,
    finished: bool,
}

impl FrameOpener {
    pub fn new(key: &[u8; 32], message_id: [u8; MESSAGE_ID_LEN], frame_len: usize) -> Result<Self> {
        Ok(Self {
            cipher: frame_cipher(key)?,
            message_id,
            frame_len,
            expected: 1,
            finished: false,
        })
    }

    /// Read the next frame from `reader`.
    ///
    /// End of input before the final frame is `Truncated`.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<OpenedFrame>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if self.finished {
            return Err(EnvelopeError::TrailingData.into());
        }

        let mut word = [0u8; 4];
        reader.read_exact(&mut word).await.map_err(EnvelopeError::from)?;
        let mut sequence = u32::from_be_bytes(word);
        let last = sequence == FINAL_MARKER;
        if last {
            reader.read_exact(&mut word).await.map_err(EnvelopeError::from)?;
            sequence = u32::from_be_bytes(word);
        }

        if sequence != self.expected {
            return Err(EnvelopeError::OutOfOrder {
                expected: self.expected,
                found: sequence,
            }
            .into());
        }

        let mut iv = [0u8; IV_LEN];
        reader.read_exact(&mut iv).await.map_err(EnvelopeError::from)?;
        if iv != frame_iv(sequence) {
            return Err(EnvelopeError::FrameAuthFailed { sequence }.into());
        }

        let len = if last {
            reader.read_exact(&mut word).await.map_err(EnvelopeError::from)?;
            let len = u32::from_be_bytes(word) as usize;
            if len > self.frame_len {
                return Err(EnvelopeError::Malformed(format!(
                    "final frame of {} bytes exceeds frame length {}",
                    len, self.frame_len
                ))
                .into());
            }
            len
        } else {
            self.frame_len
        };

        let mut sealed = vec![0u8; len + TAG_LEN];
        reader.read_exact(&mut sealed).await.map_err(EnvelopeError::from)?;

        let aad = frame_aad(&self.message_id, last, sequence, len);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| EnvelopeError::FrameAuthFailed { sequence })?;

        trace!(sequence, last, len, "opened frame");
        self.expected = self.expected.wrapping_add(1);
        self.finished = last;
        Ok(OpenedFrame { plaintext, last })
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
///
/// Returns the number of bytes read; less than `buf.len()` means the input
/// is exhausted.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

//! Decryption side of the codec.
//!
//! Readers of encrypted objects use this; the encrypt-and-replace pipeline
//! never does.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::frame::FrameOpener;
use super::header::{Header, ParsedHeader};
use super::EncryptionContext;
use crate::core::kms::Keyring;
use crate::error::{EnvelopeError, KmsError, Result};

/// Parse the header at the front of `reader` without touching any key.
pub async fn read_header<R>(reader: &mut R) -> Result<ParsedHeader>
where
    R: AsyncRead + Unpin + ?Sized,
{
    Header::read_from(reader).await
}

/// Decrypt `reader` into `writer`, returning the plaintext length.
///
/// `expected` must equal the context the object was encrypted with. Frames
/// are written out as they authenticate, so on error `writer` may already
/// hold a prefix of the plaintext; callers must discard it.
pub async fn decrypt_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    keyring: &Keyring,
    expected: &EncryptionContext,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let parsed = read_header(reader).await?;
    let header = &parsed.header;

    if header.context != *expected {
        return Err(EnvelopeError::ContextMismatch.into());
    }
    if header.provider_id != keyring.provider_id() || header.master_key != keyring.master_key() {
        return Err(KmsError::DecryptFailed(format!(
            "data key is wrapped by {} key {}, keyring holds {} key {}",
            header.provider_id,
            header.master_key,
            keyring.provider_id(),
            keyring.master_key()
        ))
        .into());
    }

    let data_key = keyring
        .decrypt_data_key(&header.wrapped_key, &header.context)
        .await?;
    let derived = header.suite.derive(&data_key, &header.message_id)?;
    parsed.verify(&derived)?;

    let mut opener = FrameOpener::new(&derived.key, header.message_id, header.frame_len as usize)?;
    let mut written = 0u64;
    loop {
        let frame = opener.read_frame(reader).await?;
        writer
            .write_all(&frame.plaintext)
            .await
            .map_err(EnvelopeError::Io)?;
        written += frame.plaintext.len() as u64;
        if frame.last {
            break;
        }
    }

    let mut probe = [0u8; 1];
    if reader.read(&mut probe).await.map_err(EnvelopeError::Io)? != 0 {
        return Err(EnvelopeError::TrailingData.into());
    }

    writer.flush().await.map_err(EnvelopeError::Io)?;
    debug!(bytes = written, "decryption finished");
    Ok(written)
}

//! Encryption side of the codec.

use bytes::Bytes;
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::frame::{read_full, FrameSealer};
use super::header::Header;
use super::suite::{Suite, MESSAGE_ID_LEN};
use super::EncryptionContext;
use crate::core::constants::MAX_FRAME_SIZE;
use crate::core::kms::Keyring;
use crate::error::{EnvelopeError, Result};

/// A started encryption: the header to emit first, and the sealer for the
/// body frames.
#[derive(Debug)]
pub struct Sealing {
    pub header: Bytes,
    pub sealer: FrameSealer,
}

/// Byte counts of a finished encryption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncryptStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

fn check_frame_len(frame_len: usize) -> Result<()> {
    if frame_len == 0 || frame_len > MAX_FRAME_SIZE {
        return Err(EnvelopeError::EncryptionFailed(format!(
            "frame length must be 1..={} bytes, got {}",
            MAX_FRAME_SIZE, frame_len
        ))
        .into());
    }
    Ok(())
}

/// Generate a data key for one object and build its header.
///
/// This is the only key-provider call on the encrypt path.
pub async fn begin_encryption(
    keyring: &Keyring,
    context: &EncryptionContext,
    frame_len: usize,
) -> Result<Sealing> {
    check_frame_len(frame_len)?;

    let mut message_id = [0u8; MESSAGE_ID_LEN];
    rand::thread_rng().fill_bytes(&mut message_id);

    let data_key = keyring.generate_data_key(context).await?;
    let suite = Suite::DEFAULT;
    let derived = suite.derive(&data_key.plaintext, &message_id)?;

    let header = Header {
        suite,
        message_id,
        context: context.clone(),
        provider_id: keyring.provider_id().to_string(),
        master_key: keyring.master_key().to_string(),
        wrapped_key: data_key.wrapped.clone(),
        frame_len: frame_len as u32,
        commitment: derived.commitment,
    }
    .seal(&derived)?;

    let sealer = FrameSealer::new(&derived.key, message_id, frame_len)?;
    debug!(
        suite = suite.name(),
        provider = keyring.provider_id(),
        header_len = header.len(),
        frame_len,
        "encryption started"
    );

    Ok(Sealing {
        header: Bytes::from(header),
        sealer,
    })
}

/// Encrypt all of `reader` into `writer`.
///
/// Holds one frame of plaintext at a time.
pub async fn encrypt_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    keyring: &Keyring,
    context: &EncryptionContext,
    frame_len: usize,
) -> Result<EncryptStats>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let Sealing { header, mut sealer } = begin_encryption(keyring, context, frame_len).await?;
    let mut stats = EncryptStats::default();

    writer.write_all(&header).await.map_err(EnvelopeError::Io)?;
    stats.bytes_out += header.len() as u64;

    let mut buf = vec![0u8; frame_len];
    loop {
        let n = read_full(reader, &mut buf).await.map_err(EnvelopeError::Io)?;
        let last = n < frame_len;
        let frame = sealer.seal(&buf[..n], last)?;
        writer.write_all(&frame).await.map_err(EnvelopeError::Io)?;
        stats.bytes_in += n as u64;
        stats.bytes_out += frame.len() as u64;
        if last {
            break;
        }
    }

    writer.flush().await.map_err(EnvelopeError::Io)?;
    Ok(stats)
}

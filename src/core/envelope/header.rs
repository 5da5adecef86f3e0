//! Ciphertext header.
//!
//! Self-describing: a reader needs nothing but a keyring for the named
//! master key to decrypt. The header ends with an AES-GCM tag computed over
//! every preceding header byte, so a changed context, wrapped key or frame
//! length is rejected before any frame is opened.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::suite::{DerivedKey, Suite, COMMITMENT_LEN, IV_LEN, MESSAGE_ID_LEN, TAG_LEN};
use super::EncryptionContext;
use crate::core::constants::MAX_FRAME_SIZE;
use crate::error::{EnvelopeError, Result};

/// Leading bytes of every ciphertext.
pub const MAGIC: &[u8; 4] = b"S3SL";

/// Current format version.
pub const VERSION: u8 = 1;

/// Parsed or to-be-written header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub suite: Suite,
    pub message_id: [u8; MESSAGE_ID_LEN],
    pub context: EncryptionContext,
    /// Key provider that wrapped the data key (`aws-kms`, `local`, ...)
    pub provider_id: String,
    /// Master key reference the data key is wrapped under
    pub master_key: String,
    pub wrapped_key: Vec<u8>,
    /// Plaintext bytes per regular frame
    pub frame_len: u32,
    pub commitment: [u8; COMMITMENT_LEN],
}

/// A header read from a stream, with the raw bytes its tag covers.
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub header: Header,
    body: Vec<u8>,
    tag: [u8; TAG_LEN],
}

fn put_field(out: &mut Vec<u8>, field: &'static str, bytes: &[u8]) -> Result<()> {
    let len = u16::try_from(bytes.len()).map_err(|_| EnvelopeError::FieldTooLong {
        field,
        len: bytes.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn header_cipher(derived: &DerivedKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(derived.key.as_ref())
        .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()).into())
}

impl Header {
    /// Header bytes up to and including the commitment.
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(128 + self.wrapped_key.len());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&self.suite.id().to_be_bytes());
        out.extend_from_slice(&self.message_id);

        let count = u16::try_from(self.context.len()).map_err(|_| {
            EnvelopeError::FieldTooLong {
                field: "encryption context",
                len: self.context.len(),
            }
        })?;
        out.extend_from_slice(&count.to_be_bytes());
        for (k, v) in self.context.iter() {
            put_field(&mut out, "context key", k.as_bytes())?;
            put_field(&mut out, "context value", v.as_bytes())?;
        }

        put_field(&mut out, "provider id", self.provider_id.as_bytes())?;
        put_field(&mut out, "master key", self.master_key.as_bytes())?;
        put_field(&mut out, "wrapped key", &self.wrapped_key)?;
        out.extend_from_slice(&self.frame_len.to_be_bytes());
        out.extend_from_slice(&self.commitment);
        Ok(out)
    }

    /// Full header: body, zero IV and the authentication tag.
    pub fn seal(&self, derived: &DerivedKey) -> Result<Vec<u8>> {
        let mut out = self.encode_body()?;
        let tag = header_cipher(derived)?
            .encrypt(
                Nonce::from_slice(&[0u8; IV_LEN]),
                Payload {
                    msg: &[],
                    aad: &out,
                },
            )
            .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;
        out.extend_from_slice(&[0u8; IV_LEN]);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Read a header from the front of `reader`.
    ///
    /// Only the structure is checked here; authenticity needs the data key,
    /// see [`ParsedHeader::verify`].
    pub async fn read_from<R>(reader: &mut R) -> Result<ParsedHeader>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut r = Recorder {
            inner: reader,
            body: Vec::with_capacity(256),
        };

        if r.take(MAGIC.len()).await? != MAGIC {
            return Err(EnvelopeError::BadMagic.into());
        }
        let version = r.take(1).await?[0];
        if version != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(version).into());
        }
        let suite = Suite::from_id(r.u16().await?)?;

        let mut message_id = [0u8; MESSAGE_ID_LEN];
        message_id.copy_from_slice(&r.take(MESSAGE_ID_LEN).await?);

        let count = r.u16().await?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let k = r.string("context key").await?;
            let v = r.string("context value").await?;
            if let Some((prev, _)) = entries.last() {
                if *prev >= k {
                    return Err(EnvelopeError::Malformed(
                        "context keys not in ascending order".to_string(),
                    )
                    .into());
                }
            }
            entries.push((k, v));
        }
        let context: EncryptionContext = entries.into_iter().collect();

        let provider_id = r.string("provider id").await?;
        let master_key = r.string("master key").await?;
        let wrapped_key = r.field().await?;

        let frame_len = r.u32().await?;
        if frame_len == 0 || frame_len as usize > MAX_FRAME_SIZE {
            return Err(EnvelopeError::Malformed(format!("frame length {}", frame_len)).into());
        }

        let mut commitment = [0u8; COMMITMENT_LEN];
        commitment.copy_from_slice(&r.take(COMMITMENT_LEN).await?);

        let body = r.body;
        let mut iv = [0u8; IV_LEN];
        reader.read_exact(&mut iv).await.map_err(EnvelopeError::from)?;
        if iv != [0u8; IV_LEN] {
            return Err(EnvelopeError::Malformed("non-zero header IV".to_string()).into());
        }
        let mut tag = [0u8; TAG_LEN];
        reader.read_exact(&mut tag).await.map_err(EnvelopeError::from)?;

        trace!(
            header_len = body.len() + IV_LEN + TAG_LEN,
            provider = %provider_id,
            "parsed ciphertext header"
        );

        Ok(ParsedHeader {
            header: Header {
                suite,
                message_id,
                context,
                provider_id,
                master_key,
                wrapped_key,
                frame_len,
                commitment,
            },
            body,
            tag,
        })
    }
}

impl ParsedHeader {
    /// Check the key commitment and the header tag.
    pub fn verify(&self, derived: &DerivedKey) -> Result<()> {
        derived.verify_commitment(&self.header.commitment)?;
        header_cipher(derived)?
            .decrypt(
                Nonce::from_slice(&[0u8; IV_LEN]),
                Payload {
                    msg: &self.tag,
                    aad: &self.body,
                },
            )
            .map_err(|_| EnvelopeError::HeaderAuthFailed)?;
        Ok(())
    }

    /// Encoded header length in bytes.
    pub fn encoded_len(&self) -> usize {
        self.body.len() + IV_LEN + TAG_LEN
    }
}

/// Reads header fields while keeping every byte for tag verification.
struct Recorder<'a, R: ?Sized> {
    inner: &'a mut R,
    body: Vec<u8>,
}

impl<R> Recorder<'_, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    async fn take(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner
            .read_exact(&mut buf)
            .await
            .map_err(EnvelopeError::from)?;
        self.body.extend_from_slice(&buf);
        Ok(buf)
    }

    async fn u16(&mut self) -> Result<u16> {
        let b = self.take(2).await?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    async fn u32(&mut self) -> Result<u32> {
        let b = self.take(4).await?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    async fn field(&mut self) -> Result<Vec<u8>> {
        let len = self.u16().await?;
        self.take(len as usize).await
    }

    async fn string(&mut self, what: &str) -> Result<String> {
        let bytes = self.field().await?;
        String::from_utf8(bytes)
            .map_err(|_| EnvelopeError::Malformed(format!("{} is not UTF-8", what)).into())
    }
}

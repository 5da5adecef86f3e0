//! Envelope codec.
//!
//! Streaming authenticated encryption under a per-object data key. The
//! ciphertext is a self-describing [`Header`] (suite, encryption context,
//! wrapped data key, key commitment) followed by sealed frames.
//!
//! ```text
//! header | frame 1 | frame 2 | ... | final frame
//! ```
//!
//! Memory use is one frame of plaintext regardless of object size.

pub mod context;
pub mod decrypt;
pub mod encrypt;
pub mod frame;
pub mod header;
pub mod suite;

pub use context::EncryptionContext;
pub use decrypt::{decrypt_stream, read_header};
pub use encrypt::{begin_encryption, encrypt_stream, EncryptStats, Sealing};
pub use frame::{read_full, FrameOpener, FrameSealer};
pub use header::{Header, ParsedHeader};
pub use suite::Suite;

//! s3seal - Encrypt-and-replace for object storage.
//!
//! An object-created event names a bucket and key; s3seal streams the
//! object through envelope encryption under a fresh data key, writes the
//! ciphertext to `<key>.encrypted` and deletes the plaintext original.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── handle        # Process an event notification
//! │   ├── encrypt       # Encrypt one object
//! │   ├── decrypt       # Decrypt an encrypted object
//! │   ├── inspect       # Print a ciphertext header
//! │   ├── local_key     # Generate a local master key
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── config        # s3seal.toml and environment overrides
//!     ├── event         # Event notification parsing
//!     ├── object        # Bucket/key references
//!     ├── envelope/     # Header, frames, key derivation
//!     ├── kms/          # Data key providers
//!     │   ├── mod       # KeyProvider trait and Keyring
//!     │   ├── aws       # AWS KMS (feature `aws`)
//!     │   ├── local     # Key file on disk
//!     │   └── memory    # In-process provider for tests
//!     ├── store/        # Object storage backends
//!     │   ├── mod       # ObjectStore and Upload traits
//!     │   ├── s3        # Amazon S3 (feature `aws`)
//!     │   ├── fs        # Directory tree
//!     │   └── memory    # In-process store for tests
//!     └── pipeline      # Source -> transform -> sink orchestration
//! ```
//!
//! # Features
//!
//! - Streaming AES-256-GCM with HKDF-SHA512 key derivation and key commitment
//! - Encryption context bound to the destination key
//! - Bounded memory regardless of object size
//! - The plaintext is deleted only after the ciphertext is committed

pub mod cli;
pub mod core;
pub mod error;

//! Configuration management.
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual fields. The master key reference is optional at load
//! time: its absence is reported per invocation by the pipeline.
//!
//! ```toml
//! [kms]
//! key = "arn:aws:kms:us-east-1:123456789012:key/abc-123"
//!
//! [store]
//! backend = "s3"
//! region = "us-east-1"
//!
//! [envelope]
//! frame_size = 4096
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::constants;
use crate::error::{ConfigError, Result};

/// Runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Key provider settings
    #[serde(default)]
    pub kms: KmsConfig,
    /// Object storage settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Ciphertext framing settings
    #[serde(default)]
    pub envelope: EnvelopeConfig,
}

/// Key provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KmsConfig {
    /// Master key reference.
    ///
    /// - AWS: `arn:aws:kms:us-east-1:123456789012:key/abc-123`, a key id or `alias/...`
    /// - Local: `local:<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Key file backing `local:` references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key_file: Option<PathBuf>,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Amazon S3 or an S3-compatible endpoint
    #[default]
    S3,
    /// Local directory, one subdirectory per bucket
    Fs,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "fs" | "filesystem" => Ok(Self::Fs),
            other => Err(ConfigError::InvalidValue {
                field: "store.backend",
                reason: format!("unknown backend '{}'. Supported: s3, fs", other),
            }),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory for the `fs` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// AWS region override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom S3-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Multipart upload part size in bytes
    #[serde(default = "default_part_size")]
    pub part_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            root: None,
            region: None,
            endpoint: None,
            part_size: default_part_size(),
        }
    }
}

fn default_part_size() -> usize {
    constants::DEFAULT_PART_SIZE
}

/// Ciphertext framing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Plaintext bytes per frame
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
        }
    }
}

fn default_frame_size() -> usize {
    constants::DEFAULT_FRAME_SIZE
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Reads `path` if given, else the file named by `S3SEAL_CONFIG` if set,
    /// else starts from defaults. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load configuration with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env(constants::CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;

        debug!(
            backend = ?config.store.backend,
            frame_size = config.envelope.frame_size,
            master_key_set = config.kms.key.is_some(),
            "config loaded"
        );

        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "reading config file");
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&contents)
    }

    /// Parse TOML config text.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents).map_err(ConfigError::Parse)?)
    }

    /// Apply environment variable overrides.
    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(key) =
            non_empty(constants::KMS_KEY_ENV).or_else(|| non_empty(constants::LEGACY_KMS_KEY_ENV))
        {
            self.kms.key = Some(key);
        }
        if let Some(file) = non_empty("S3SEAL_LOCAL_KEY_FILE") {
            self.kms.local_key_file = Some(PathBuf::from(file));
        }
        if let Some(backend) = non_empty("S3SEAL_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(root) = non_empty("S3SEAL_FS_ROOT") {
            self.store.root = Some(PathBuf::from(root));
        }
        if let Some(endpoint) = non_empty("S3SEAL_ENDPOINT") {
            self.store.endpoint = Some(endpoint);
        }
        if let Some(region) = non_empty("AWS_REGION") {
            self.store.region.get_or_insert(region);
        }
        if let Some(size) = non_empty("S3SEAL_FRAME_SIZE") {
            self.envelope.frame_size = size.parse().map_err(|_| ConfigError::InvalidValue {
                field: "envelope.frame_size",
                reason: format!("not a number: {}", size),
            })?;
        }

        // An empty key in the file counts as unset.
        if self.kms.key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.kms.key = None;
        }

        Ok(())
    }

    /// Validate ranges and backend requirements.
    pub fn validate(&self) -> Result<()> {
        let frame = self.envelope.frame_size;
        if !(constants::MIN_FRAME_SIZE..=constants::MAX_FRAME_SIZE).contains(&frame) {
            return Err(ConfigError::InvalidValue {
                field: "envelope.frame_size",
                reason: format!(
                    "{} is outside {}..={}",
                    frame,
                    constants::MIN_FRAME_SIZE,
                    constants::MAX_FRAME_SIZE
                ),
            }
            .into());
        }

        if self.store.part_size < constants::MIN_PART_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "store.part_size",
                reason: format!(
                    "{} is below the {} byte multipart minimum",
                    self.store.part_size,
                    constants::MIN_PART_SIZE
                ),
            }
            .into());
        }

        if self.store.backend == StoreBackend::Fs && self.store.root.is_none() {
            return Err(ConfigError::MissingField {
                field: "store.root",
            }
            .into());
        }

        Ok(())
    }

    /// The master key reference, or a configuration error when unset.
    pub fn master_key(&self) -> std::result::Result<&str, ConfigError> {
        self.kms.key.as_deref().ok_or(ConfigError::MissingMasterKey)
    }
}

//! Backend selection.
//!
//! Picks the storage backend named by configuration.

use std::sync::Arc;

use tracing::info;

use super::{FsStore, ObjectStore};
use crate::core::config::{Config, StoreBackend};
use crate::error::{ConfigError, Result};

/// Build the configured object store.
pub async fn from_config(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match config.store.backend {
        StoreBackend::Fs => {
            let root = config
                .store
                .root
                .as_deref()
                .ok_or(ConfigError::MissingField { field: "store.root" })?;
            info!(root = %root.display(), "using filesystem store");
            Ok(Arc::new(FsStore::new(root)))
        }

        #[cfg(feature = "aws")]
        StoreBackend::S3 => {
            info!(
                region = config.store.region.as_deref().unwrap_or("default"),
                endpoint = config.store.endpoint.as_deref().unwrap_or("default"),
                "using S3 store"
            );
            Ok(Arc::new(super::s3::S3Store::new(&config.store).await))
        }

        #[cfg(not(feature = "aws"))]
        StoreBackend::S3 => Err(ConfigError::FeatureDisabled {
            feature: "aws",
            what: "the S3 store".to_string(),
        }
        .into()),
    }
}

//! Staging backend selection.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalStaging;
use crate::r2::{R2Config, R2Staging};
use crate::staging::BlobStaging;

/// Which backend stages media between stages.
#[derive(Debug, Clone)]
pub enum StagingConfig {
    /// Shared local directory
    Local { root: PathBuf },
    /// S3-compatible bucket
    R2(R2Config),
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self::Local {
            root: PathBuf::from("./staging"),
        }
    }
}

impl StagingConfig {
    /// Create config from environment variables (`STAGING_BACKEND=local|r2`).
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("STAGING_BACKEND").unwrap_or_else(|_| "local".to_string());
        match backend.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local {
                root: std::env::var("STAGING_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./staging")),
            }),
            "r2" => Ok(Self::R2(R2Config::from_env()?)),
            other => Err(StorageError::config_error(format!(
                "unknown STAGING_BACKEND: {}",
                other
            ))),
        }
    }

    /// Instantiate the configured backend.
    pub async fn build(&self) -> StorageResult<Arc<dyn BlobStaging>> {
        match self {
            StagingConfig::Local { root } => {
                tokio::fs::create_dir_all(root).await?;
                info!(root = %root.display(), "Using local staging");
                Ok(Arc::new(LocalStaging::new(root.clone())))
            }
            StagingConfig::R2(config) => {
                let staging = R2Staging::new(config.clone());
                staging.check_connectivity().await?;
                info!(bucket = %config.bucket_name, "Using R2 staging");
                Ok(Arc::new(staging))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_local_creates_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("nested/staging");
        let staging = StagingConfig::Local { root: root.clone() }.build().await.unwrap();
        assert_eq!(staging.backend(), "local");
        assert!(root.is_dir());
    }
}

//! Persistence of trained models.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::TrainedModel;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("model store I/O failed at `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("model store backend failed: {0}")]
    Backend(String),
}

/// Durable home of trained models. `save` returns an opaque location that
/// `load` accepts; `load_current` returns the most recently saved model.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn save(&self, model: &TrainedModel) -> Result<String, StoreError>;
    async fn load(&self, location: &str) -> Result<Option<TrainedModel>, StoreError>;
    async fn load_current(&self) -> Result<Option<TrainedModel>, StoreError>;
}

/// JSON file store. Writes go to a sibling temp file first and are renamed
/// into place so a crashed save never leaves a truncated model behind.
#[derive(Clone, Debug)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io { path: path.display().to_string(), source }
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn save(&self, model: &TrainedModel) -> Result<String, StoreError> {
        let encoded = serde_json::to_vec_pretty(model)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Self::io_error(parent, e))?;
        }

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &encoded).await.map_err(|e| Self::io_error(&staging, e))?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|e| Self::io_error(&self.path, e))?;

        let location = self.path.display().to_string();
        info!(
            event_name = "model_store.saved",
            model_id = %model.id,
            model_family = %model.family(),
            location = %location,
            "model saved"
        );
        Ok(location)
    }

    async fn load(&self, location: &str) -> Result<Option<TrainedModel>, StoreError> {
        let path = Path::new(location);
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(Self::io_error(path, error)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn load_current(&self) -> Result<Option<TrainedModel>, StoreError> {
        let location = self.path.display().to_string();
        self.load(&location).await
    }
}

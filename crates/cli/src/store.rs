use async_trait::async_trait;
use promolift_core::config::{ModelStoreKind, TrainingConfig};
use promolift_core::ml::store::{FileModelStore, ModelStore, StoreError};
use promolift_core::ml::TrainedModel;
use promolift_db::{DbPool, SqlModelStore};

/// The model store selected by `training.model_store`.
pub enum ConfiguredModelStore {
    File(FileModelStore),
    Database(SqlModelStore),
}

impl ConfiguredModelStore {
    pub fn from_config(training: &TrainingConfig, pool: &DbPool) -> Self {
        match training.model_store {
            ModelStoreKind::File => Self::File(FileModelStore::new(&training.model_path)),
            ModelStoreKind::Database => Self::Database(SqlModelStore::new(pool.clone())),
        }
    }

    pub fn kind(&self) -> ModelStoreKind {
        match self {
            Self::File(_) => ModelStoreKind::File,
            Self::Database(_) => ModelStoreKind::Database,
        }
    }
}

#[async_trait]
impl ModelStore for ConfiguredModelStore {
    async fn save(&self, model: &TrainedModel) -> Result<String, StoreError> {
        match self {
            Self::File(store) => store.save(model).await,
            Self::Database(store) => store.save(model).await,
        }
    }

    async fn load(&self, location: &str) -> Result<Option<TrainedModel>, StoreError> {
        match self {
            Self::File(store) => store.load(location).await,
            Self::Database(store) => store.load(location).await,
        }
    }

    async fn load_current(&self) -> Result<Option<TrainedModel>, StoreError> {
        match self {
            Self::File(store) => store.load_current().await,
            Self::Database(store) => store.load_current().await,
        }
    }
}

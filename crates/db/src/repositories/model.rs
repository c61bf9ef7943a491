use async_trait::async_trait;
use sqlx::Row;
use tracing::info;

use promolift_core::ml::store::{ModelStore, StoreError};
use promolift_core::ml::TrainedModel;

use super::{decode_err, RepositoryError};
use crate::DbPool;

const LOCATION_PREFIX: &str = "sqlite:trained_model/";

/// Model store backed by the `trained_model` table. Every save appends a row;
/// the most recently trained row is the current model.
#[derive(Clone)]
pub struct SqlModelStore {
    pool: DbPool,
}

impl SqlModelStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn location_for(model_id: &str) -> String {
        format!("{LOCATION_PREFIX}{model_id}")
    }

    async fn insert(&self, model: &TrainedModel) -> Result<String, RepositoryError> {
        let payload = serde_json::to_string(model).map_err(decode_err)?;
        let id = model.id.to_string();

        sqlx::query(
            "INSERT INTO trained_model (id, family, schema_fingerprint, r2, rmse, mae,
                                        training_samples, payload_json, trained_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET payload_json = excluded.payload_json",
        )
        .bind(&id)
        .bind(model.family().as_str())
        .bind(&model.schema.fingerprint)
        .bind(model.metrics.r2)
        .bind(model.metrics.rmse)
        .bind(model.metrics.mae)
        .bind(i64::try_from(model.training_samples).unwrap_or(i64::MAX))
        .bind(payload)
        .bind(model.trained_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Self::location_for(&id))
    }

    async fn payload(&self, sql: &str, bind: Option<&str>) -> Result<Option<TrainedModel>, RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let Some(row) = query.fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload_json").map_err(decode_err)?;
        serde_json::from_str(&payload).map(Some).map_err(decode_err)
    }
}

#[async_trait]
impl ModelStore for SqlModelStore {
    async fn save(&self, model: &TrainedModel) -> Result<String, StoreError> {
        let location = self.insert(model).await?;
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
        let id = location.strip_prefix(LOCATION_PREFIX).unwrap_or(location);
        Ok(self
            .payload("SELECT payload_json FROM trained_model WHERE id = ?", Some(id))
            .await?)
    }

    async fn load_current(&self) -> Result<Option<TrainedModel>, StoreError> {
        Ok(self
            .payload(
                "SELECT payload_json FROM trained_model ORDER BY trained_at DESC, rowid DESC LIMIT 1",
                None,
            )
            .await?)
    }
}

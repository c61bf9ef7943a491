use async_trait::async_trait;
use thiserror::Error;

use promolift_core::domain::article::CategoryId;
use promolift_core::ml::store::StoreError;
use promolift_core::provider::ProviderError;
use promolift_core::report::AnalysisReport;

pub mod memory;
pub mod model;
pub mod promotion_data;
pub mod report;

pub use memory::{InMemoryModelStore, InMemoryPromotionDataProvider};
pub use model::SqlModelStore;
pub use promotion_data::SqlPromotionDataProvider;
pub use report::{SqlAnalysisReportRepository, StoredReportSummary};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ProviderError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => Self::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => Self::Malformed(message),
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        Self::Backend(error.to_string())
    }
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

#[async_trait]
pub trait AnalysisReportRepository: Send + Sync {
    async fn save(&self, report: &AnalysisReport) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, run_id: &str) -> Result<Option<AnalysisReport>, RepositoryError>;
    async fn list_for_category(
        &self,
        category_id: &CategoryId,
        limit: u32,
    ) -> Result<Vec<StoredReportSummary>, RepositoryError>;
}

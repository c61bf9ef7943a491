use thiserror::Error;

use crate::ml::selection::TrainingError;
use crate::ml::store::StoreError;
use crate::provider::ProviderError;
use crate::scoring::ScoringError;

/// Caller-facing failures of the advisor. Numeric degeneracies and model
/// application errors never show up here; they are recovered inside the engine.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("{entity} `{id}` not found")]
    DataNotFound { entity: &'static str, id: String },
    #[error(
        "insufficient training data: {available} usable examples, {required} required ({excluded} excluded)"
    )]
    InsufficientData { available: usize, required: usize, excluded: usize },
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error(transparent)]
    DataAccess(#[from] ProviderError),
    #[error(transparent)]
    ModelStore(#[from] StoreError),
    #[error("training failed: {0}")]
    Training(String),
}

impl AdvisorError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::DataNotFound { entity, id: id.to_string() }
    }

    /// Stable machine-readable class used in command output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::DataNotFound { .. } => "data_not_found",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Configuration(_) => "configuration",
            Self::DataAccess(_) => "data_access",
            Self::ModelStore(_) => "model_store",
            Self::Training(_) => "training",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DataNotFound { .. } => "The requested category or article does not exist.",
            Self::InsufficientData { .. } => {
                "Not enough completed promotions to train a model. The previous model was kept."
            }
            Self::Configuration(_) => "The configuration is invalid. Fix it and try again.",
            Self::DataAccess(_) => "The data source is unavailable. Please retry shortly.",
            Self::ModelStore(_) => "The model store could not be read or written.",
            Self::Training(_) => "Model training failed.",
        }
    }
}

impl From<ScoringError> for AdvisorError {
    fn from(error: ScoringError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl From<TrainingError> for AdvisorError {
    fn from(error: TrainingError) -> Self {
        match error {
            TrainingError::InsufficientData { available, required, excluded } => {
                Self::InsufficientData { available, required, excluded }
            }
            other => Self::Training(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AdvisorError;
    use crate::ml::selection::TrainingError;
    use crate::provider::ProviderError;
    use crate::scoring::ScoringError;

    #[test]
    fn insufficient_training_data_keeps_its_counts() {
        let error = AdvisorError::from(TrainingError::InsufficientData {
            available: 4,
            required: 20,
            excluded: 3,
        });

        assert!(matches!(
            error,
            AdvisorError::InsufficientData { available: 4, required: 20, excluded: 3 }
        ));
        assert_eq!(error.error_class(), "insufficient_data");
    }

    #[test]
    fn scoring_errors_are_configuration_failures() {
        let error = AdvisorError::from(ScoringError::InvalidBounds { min: 40, max: 10 });
        assert_eq!(error.error_class(), "configuration");
        assert!(error.to_string().contains("min=40"));
    }

    #[test]
    fn provider_errors_are_data_access_failures() {
        let error = AdvisorError::from(ProviderError::Unavailable("pool closed".to_owned()));
        assert_eq!(error.error_class(), "data_access");
        assert_eq!(error.to_string(), "data source unavailable: pool closed");
        assert_eq!(error.user_message(), "The data source is unavailable. Please retry shortly.");
    }

    #[test]
    fn not_found_names_the_entity() {
        let error = AdvisorError::not_found("category", "C-9");
        assert_eq!(error.to_string(), "category `C-9` not found");
    }
}

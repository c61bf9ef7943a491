pub mod advisor;
pub mod config;
pub mod domain;
pub mod errors;
pub mod features;
pub mod impact;
pub mod ml;
pub mod predictor;
pub mod provider;
pub mod report;
pub mod scoring;

pub use advisor::{
    AdvisorSettings, ModelState, ModelStatus, PromotionAdvisor, TrainingReport, TrainingScope,
};
pub use domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
pub use domain::history::{DateWindow, InjectionRecord, PromotionRecord, SalesRecord};
pub use errors::AdvisorError;
pub use features::{ArticleHistory, FeatureExtractor, FeatureVector, FeatureWindows};
pub use impact::{ImpactEstimate, ImpactEstimator, Recommendation, RiskLevel, StockThresholds};
pub use ml::store::{FileModelStore, ModelStore, StoreError};
pub use ml::{ModelFamily, ModelMetrics, TrainedModel};
pub use predictor::{PredictionMethod, Predictor, PredictorState, UntrainedReason};
pub use provider::{PromotionDataProvider, ProviderError};
pub use report::{AnalysisReport, AnalysisSummary, PredictionResult, SkippedArticle};
pub use scoring::{ClassicScorer, PromotionBounds, ScoreWeights};

//! Promotion advisor
//!
//! Caller-facing service over a data provider and a model store. `analyze`
//! scores every article of a category and never fails because of the model:
//! the predictor falls back to classic scoring. `train` replaces the model
//! only after a successful fit and save.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
use crate::domain::history::{revenue_in, DateWindow};
use crate::errors::AdvisorError;
use crate::features::{earliest_sales_date, ArticleHistory, FeatureExtractor, FeatureWindows};
use crate::impact::{ImpactEstimator, ImpactInputs, Recommendation, RiskLevel, StockThresholds};
use crate::ml::selection::{CandidateReport, ModelTrainer, TrainerSettings};
use crate::ml::simulation::simulated_dataset;
use crate::ml::store::ModelStore;
use crate::ml::training::{ExclusionReason, TrainingDataBuilder, TrainingDataset};
use crate::ml::{ModelFamily, ModelMetrics};
use crate::predictor::{PredictionMethod, Predictor, PredictorState, UntrainedReason};
use crate::provider::{CategoryArticles, PromotionDataProvider, ProviderError};
use crate::report::{
    AnalysisReport, AnalysisSummary, ModelSummary, PredictionResult, SkippedArticle,
};
use crate::scoring::{ClassicScorer, PromotionBounds, ScoreWeights};

/// Immutable engine settings, validated once at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisorSettings {
    pub weights: ScoreWeights,
    pub bounds: PromotionBounds,
    pub windows: FeatureWindows,
    pub projection_horizon_days: u32,
    pub stock: StockThresholds,
    pub trainer: TrainerSettings,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            bounds: PromotionBounds::default(),
            windows: FeatureWindows::default(),
            projection_horizon_days: 30,
            stock: StockThresholds::default(),
            trainer: TrainerSettings::default(),
        }
    }
}

impl AdvisorSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, AdvisorError> {
        let settings = Self {
            weights: config.score_weights().normalized()?,
            bounds: PromotionBounds::new(
                config.scoring.min_promotion_pct,
                config.scoring.max_promotion_pct,
            )?,
            windows: config.feature_windows(),
            projection_horizon_days: config.analysis.projection_horizon_days,
            stock: config.stock_thresholds(),
            trainer: config.trainer_settings(),
        };
        Ok(settings)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrainingScope {
    Category(CategoryId),
    All,
}

impl TrainingScope {
    pub fn label(&self) -> String {
        match self {
            Self::Category(id) => id.0.clone(),
            Self::All => "all".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub scope: String,
    pub as_of: NaiveDate,
    pub simulated: bool,
    pub examples: usize,
    pub excluded: usize,
    pub exclusion_counts: BTreeMap<ExclusionReason, usize>,
    pub train_size: usize,
    pub holdout_size: usize,
    pub candidates: Vec<CandidateReport>,
    pub model: ModelSummary,
    pub location: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Trained,
    Untrained,
    Stale,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub state: ModelState,
    pub model_id: Option<Uuid>,
    pub family: Option<ModelFamily>,
    pub metrics: Option<ModelMetrics>,
    pub trained_at: Option<DateTime<Utc>>,
    pub reason: Option<UntrainedReason>,
}

pub struct PromotionAdvisor<P, S> {
    provider: P,
    store: S,
    settings: AdvisorSettings,
    extractor: FeatureExtractor,
    estimator: ImpactEstimator,
    predictor: Predictor,
}

impl<P, S> PromotionAdvisor<P, S>
where
    P: PromotionDataProvider,
    S: ModelStore,
{
    pub fn new(provider: P, store: S, settings: AdvisorSettings) -> Result<Self, AdvisorError> {
        let scorer = ClassicScorer::new(settings.weights, settings.bounds)?;
        Ok(Self {
            extractor: FeatureExtractor::new(settings.windows),
            estimator: ImpactEstimator::new(settings.projection_horizon_days),
            predictor: Predictor::new(scorer),
            provider,
            store,
            settings,
        })
    }

    pub fn settings(&self) -> &AdvisorSettings {
        &self.settings
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the current model from the store. Store failures and stale models
    /// leave the predictor untrained; neither is an error for the caller.
    pub async fn load_model(&mut self) -> &PredictorState {
        match self.store.load_current().await {
            Ok(Some(model)) => {
                self.predictor.install(model);
            }
            Ok(None) => self.predictor.mark_untrained(UntrainedReason::NoModel),
            Err(error) => {
                warn!(
                    event_name = "advisor.model_load_failed",
                    error = %error,
                    "could not load persisted model; using classic scoring"
                );
                self.predictor
                    .mark_untrained(UntrainedReason::LoadFailed { message: error.to_string() });
            }
        }
        self.predictor.state()
    }

    pub fn model_status(&self) -> ModelStatus {
        match self.predictor.state() {
            PredictorState::Trained(model) => ModelStatus {
                state: ModelState::Trained,
                model_id: Some(model.id),
                family: Some(model.family()),
                metrics: Some(model.metrics),
                trained_at: Some(model.trained_at),
                reason: None,
            },
            PredictorState::Untrained(reason) => ModelStatus {
                state: if matches!(reason, UntrainedReason::Stale { .. }) {
                    ModelState::Stale
                } else {
                    ModelState::Untrained
                },
                model_id: None,
                family: None,
                metrics: None,
                trained_at: None,
                reason: Some(reason.clone()),
            },
        }
    }

    /// Score every article of `category_id` as of the end of `as_of`.
    pub async fn analyze(
        &self,
        category_id: &CategoryId,
        as_of: NaiveDate,
    ) -> Result<AnalysisReport, AdvisorError> {
        let category = self.require_category(category_id).await?;
        let CategoryArticles { articles, malformed } =
            self.provider.articles_in_category(category_id).await?;
        let cutoff = exclusive_cutoff(as_of);

        let mut results = Vec::with_capacity(articles.len());
        let mut skipped = Vec::new();
        for row in malformed {
            skipped.push(skip(category_id, row.article_id, MALFORMED_CLASS, row.message));
        }
        for article in articles {
            let article_id = article.id.clone();
            match self.score_article(article, cutoff).await {
                Ok(result) => results.push(result),
                Err(ArticleFailure::Fatal(error)) => return Err(error),
                Err(ArticleFailure::Skip { error_class, message }) => {
                    skipped.push(skip(category_id, article_id, error_class, message));
                }
            }
        }
        skipped.sort_by(|a, b| a.article_id.cmp(&b.article_id));

        let used_model = results.iter().any(|r| r.prediction_method == PredictionMethod::Ai);
        let model = if used_model { self.predictor.model().map(ModelSummary::from) } else { None };
        let summary = AnalysisSummary::from_results(&results, self.settings.stock.stock_critical);

        info!(
            event_name = "advisor.analysis_completed",
            category_id = %category_id,
            scored = results.len(),
            skipped = skipped.len(),
            ai = summary.method_distribution.get(&PredictionMethod::Ai).copied().unwrap_or(0),
            "analysis completed"
        );

        Ok(AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            as_of,
            category_id: category.id,
            category_name: category.name,
            model,
            results,
            skipped,
            summary,
        })
    }

    /// Score a single article. Unlike batch analysis, an unusable article is
    /// reported as an error.
    pub async fn analyze_article(
        &self,
        article_id: &ArticleId,
        as_of: NaiveDate,
    ) -> Result<PredictionResult, AdvisorError> {
        let article = self
            .provider
            .article(article_id)
            .await?
            .ok_or_else(|| AdvisorError::not_found("article", article_id))?;

        match self.score_article(article, exclusive_cutoff(as_of)).await {
            Ok(result) => Ok(result),
            Err(ArticleFailure::Fatal(error)) => Err(error),
            Err(ArticleFailure::Skip { message, .. }) => {
                Err(AdvisorError::DataAccess(ProviderError::Malformed(message)))
            }
        }
    }

    /// Build a dataset from completed promotions, fit all families and swap
    /// in the winner. On any failure the current model stays in place.
    pub async fn train(
        &mut self,
        scope: TrainingScope,
        as_of: NaiveDate,
    ) -> Result<TrainingReport, AdvisorError> {
        let category_ids = match &scope {
            TrainingScope::Category(id) => vec![self.require_category(id).await?.id],
            TrainingScope::All => {
                self.provider.categories().await?.into_iter().map(|c| c.id).collect()
            }
        };

        let mut articles = Vec::new();
        for category_id in &category_ids {
            let listed = self.provider.articles_in_category(category_id).await?;
            for row in listed.malformed {
                warn!(
                    event_name = "advisor.training_article_skipped",
                    category_id = %category_id,
                    article_id = %row.article_id,
                    message = %row.message,
                    "malformed article left out of training data"
                );
            }
            articles.extend(listed.articles);
        }

        let cutoff = exclusive_cutoff(as_of);
        let mut histories = Vec::with_capacity(articles.len());
        for article in articles {
            histories.push(self.full_history(article, cutoff).await?);
        }

        let dataset = TrainingDataBuilder::new(self.extractor.clone()).build(&histories, as_of);
        self.fit_and_install(scope.label(), as_of, dataset, false).await
    }

    /// Train on seeded synthetic outcomes when no promotion history exists.
    pub async fn train_simulated(
        &mut self,
        samples: usize,
        as_of: NaiveDate,
    ) -> Result<TrainingReport, AdvisorError> {
        let dataset = simulated_dataset(samples, self.settings.trainer.seed, as_of);
        self.fit_and_install("simulated".to_string(), as_of, dataset, true).await
    }

    async fn fit_and_install(
        &mut self,
        scope: String,
        as_of: NaiveDate,
        dataset: TrainingDataset,
        simulated: bool,
    ) -> Result<TrainingReport, AdvisorError> {
        let trainer = ModelTrainer::new(self.settings.trainer);
        let outcome = trainer.train(&dataset).map_err(|error| {
            warn!(
                event_name = "advisor.training_failed",
                scope = %scope,
                examples = dataset.len(),
                excluded = dataset.excluded_count(),
                error = %error,
                "training failed; keeping the current model"
            );
            AdvisorError::from(error)
        })?;

        let location = self.store.save(&outcome.model).await?;
        let summary = ModelSummary::from(&outcome.model);
        info!(
            event_name = "advisor.model_trained",
            scope = %scope,
            model_id = %summary.model_id,
            model_family = %summary.family,
            r2 = summary.metrics.r2,
            location = %location,
            "model trained and saved"
        );
        self.predictor.install(outcome.model);

        Ok(TrainingReport {
            scope,
            as_of,
            simulated,
            examples: dataset.len(),
            excluded: dataset.excluded_count(),
            exclusion_counts: dataset.exclusion_counts(),
            train_size: outcome.train_size,
            holdout_size: outcome.holdout_size,
            candidates: outcome.candidates,
            model: summary,
            location,
        })
    }

    async fn require_category(&self, id: &CategoryId) -> Result<Category, AdvisorError> {
        self.provider.category(id).await?.ok_or_else(|| AdvisorError::not_found("category", id))
    }

    async fn score_article(
        &self,
        article: ArticleSnapshot,
        cutoff: NaiveDate,
    ) -> Result<PredictionResult, ArticleFailure> {
        if article.price_f64() <= 0.0 {
            return Err(ArticleFailure::Skip {
                error_class: "invalid_price",
                message: format!("article `{}` has non-positive price {}", article.id, article.price),
            });
        }

        let history = self.analysis_history(article, cutoff).await?;
        let features = self.extractor.extract(&history, cutoff);
        let prediction = self.predictor.predict(&features);

        let article = &history.article;
        let discounted_price = article.discounted_price(prediction.promotion_pct);
        let sales_window = self.extractor.sales_window(cutoff);
        let baseline_daily_sales = self.extractor.daily_sales_rate(&history.sales, cutoff);
        let baseline_daily_revenue = baseline_daily_sales
            .map(|_| revenue_in(&history.sales, sales_window) / sales_window.days() as f64);

        let impact = self.estimator.estimate(&ImpactInputs {
            promotion_pct: prediction.promotion_pct,
            current_price: article.price_f64(),
            discounted_price: discounted_price.to_f64().unwrap_or(0.0),
            current_stock: article.current_stock,
            elasticity_score: features.elasticity_score,
            baseline_daily_sales,
            baseline_daily_revenue,
        });
        let recommendation =
            Recommendation::classify(article.current_stock, &self.settings.stock, &impact);

        Ok(PredictionResult {
            article_id: article.id.clone(),
            article_name: article.name.clone(),
            current_stock: article.current_stock,
            current_price: article.price,
            discounted_price,
            scores: features,
            final_score: prediction.final_score,
            promotion_pct: prediction.promotion_pct,
            classic_promotion_pct: prediction.classic.promotion_pct,
            prediction_method: prediction.method,
            projected_sales: impact.projected_sales_volume,
            projected_revenue: impact.projected_revenue,
            recommendation_message: recommendation.message(prediction.promotion_pct, &impact),
            recommendation,
            risk_level: RiskLevel::assess(article.current_stock, prediction.promotion_pct, &impact),
            impact,
        })
    }

    /// Records visible at `cutoff`: all promotions, sales far enough back to
    /// cover every promotion baseline, injections over the sales window.
    async fn analysis_history(
        &self,
        article: ArticleSnapshot,
        cutoff: NaiveDate,
    ) -> Result<ArticleHistory, ArticleFailure> {
        let promotions =
            self.provider.promotions(&article.id, DateWindow::history_until(cutoff)).await?;
        let sales_start = earliest_sales_date(self.extractor.windows(), &promotions, cutoff);
        let sales = self.provider.sales(&article.id, DateWindow::new(sales_start, cutoff)).await?;
        let injections =
            self.provider.injections(&article.id, self.extractor.sales_window(cutoff)).await?;

        Ok(ArticleHistory { article, sales, injections, promotions })
    }

    async fn full_history(
        &self,
        article: ArticleSnapshot,
        cutoff: NaiveDate,
    ) -> Result<ArticleHistory, AdvisorError> {
        let window = DateWindow::history_until(cutoff);
        let promotions = self.provider.promotions(&article.id, window).await?;
        let sales = self.provider.sales(&article.id, window).await?;
        let injections = self.provider.injections(&article.id, window).await?;
        Ok(ArticleHistory { article, sales, injections, promotions })
    }
}

const MALFORMED_CLASS: &str = "data_access";

/// First day not visible to a run dated `as_of`.
fn exclusive_cutoff(as_of: NaiveDate) -> NaiveDate {
    as_of.succ_opt().unwrap_or(NaiveDate::MAX)
}

fn skip(
    category_id: &CategoryId,
    article_id: ArticleId,
    error_class: &'static str,
    message: String,
) -> SkippedArticle {
    warn!(
        event_name = "advisor.article_skipped",
        category_id = %category_id,
        article_id = %article_id,
        error_class,
        message = %message,
        "article skipped"
    );
    SkippedArticle { article_id, error_class: error_class.to_string(), message }
}

/// Per-article failure during a batch. Malformed rows skip the article;
/// anything else aborts the run.
enum ArticleFailure {
    Skip { error_class: &'static str, message: String },
    Fatal(AdvisorError),
}

impl From<ProviderError> for ArticleFailure {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Malformed(message) => Self::Skip { error_class: MALFORMED_CLASS, message },
            other => Self::Fatal(AdvisorError::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::history::{InjectionRecord, PromotionRecord, SalesRecord};
    use crate::ml::store::StoreError;
    use crate::ml::TrainedModel;
    use crate::provider::MalformedArticle;

    #[derive(Default)]
    struct StaticProvider {
        categories: Vec<Category>,
        articles: Vec<ArticleSnapshot>,
        sales: HashMap<ArticleId, Vec<SalesRecord>>,
        malformed: Vec<MalformedArticle>,
        fail_sales: bool,
    }

    #[async_trait]
    impl PromotionDataProvider for StaticProvider {
        async fn categories(&self) -> Result<Vec<Category>, ProviderError> {
            Ok(self.categories.clone())
        }

        async fn category(&self, id: &CategoryId) -> Result<Option<Category>, ProviderError> {
            Ok(self.categories.iter().find(|c| &c.id == id).cloned())
        }

        async fn articles_in_category(
            &self,
            id: &CategoryId,
        ) -> Result<CategoryArticles, ProviderError> {
            Ok(CategoryArticles {
                articles: self.articles.iter().filter(|a| &a.category_id == id).cloned().collect(),
                malformed: self.malformed.clone(),
            })
        }

        async fn article(&self, id: &ArticleId) -> Result<Option<ArticleSnapshot>, ProviderError> {
            Ok(self.articles.iter().find(|a| &a.id == id).cloned())
        }

        async fn sales(
            &self,
            article: &ArticleId,
            window: DateWindow,
        ) -> Result<Vec<SalesRecord>, ProviderError> {
            if self.fail_sales {
                return Err(ProviderError::Unavailable("connection reset".to_string()));
            }
            Ok(self
                .sales
                .get(article)
                .map(|rows| rows.iter().filter(|s| window.contains(s.sold_on)).cloned().collect())
                .unwrap_or_default())
        }

        async fn injections(
            &self,
            _article: &ArticleId,
            _window: DateWindow,
        ) -> Result<Vec<InjectionRecord>, ProviderError> {
            Ok(Vec::new())
        }

        async fn promotions(
            &self,
            _article: &ArticleId,
            _window: DateWindow,
        ) -> Result<Vec<PromotionRecord>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        current: Mutex<Option<TrainedModel>>,
    }

    #[async_trait]
    impl ModelStore for MemoryStore {
        async fn save(&self, model: &TrainedModel) -> Result<String, StoreError> {
            let mut current =
                self.current.lock().map_err(|_| StoreError::Backend("poisoned".to_string()))?;
            *current = Some(model.clone());
            Ok(format!("memory:{}", model.id))
        }

        async fn load(&self, _location: &str) -> Result<Option<TrainedModel>, StoreError> {
            self.load_current().await
        }

        async fn load_current(&self) -> Result<Option<TrainedModel>, StoreError> {
            let current =
                self.current.lock().map_err(|_| StoreError::Backend("poisoned".to_string()))?;
            Ok(current.clone())
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date")
    }

    fn article(id: &str, price: Decimal) -> ArticleSnapshot {
        ArticleSnapshot {
            id: ArticleId(id.to_string()),
            name: format!("Article {id}"),
            category_id: CategoryId("C-1".to_string()),
            current_stock: 40,
            min_stock_threshold: 5,
            price,
        }
    }

    fn provider() -> StaticProvider {
        let a1 = article("A-1", Decimal::new(2500, 2));
        let sales = (0..45)
            .map(|i| SalesRecord {
                article_id: a1.id.clone(),
                sold_on: as_of() - Duration::days(i * 2),
                quantity: 3,
                unit_price: a1.price,
            })
            .collect();
        StaticProvider {
            categories: vec![Category { id: CategoryId("C-1".to_string()), name: "Kitchen".to_string() }],
            sales: HashMap::from([(a1.id.clone(), sales)]),
            articles: vec![a1, article("A-2", Decimal::ZERO), article("A-3", Decimal::new(990, 2))],
            malformed: Vec::new(),
            fail_sales: false,
        }
    }

    fn advisor(provider: StaticProvider) -> PromotionAdvisor<StaticProvider, MemoryStore> {
        PromotionAdvisor::new(provider, MemoryStore::default(), AdvisorSettings::default())
            .expect("valid settings")
    }

    #[tokio::test]
    async fn untrained_analysis_is_classic_and_skips_bad_prices() {
        let advisor = advisor(provider());
        let report = advisor.analyze(&CategoryId("C-1".to_string()), as_of()).await.expect("report");

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].error_class, "invalid_price");
        assert!(report.model.is_none());
        for result in &report.results {
            assert_eq!(result.prediction_method, PredictionMethod::Classic);
            assert!((5..=50).contains(&result.promotion_pct));
        }
    }

    #[tokio::test]
    async fn undecodable_article_rows_are_skipped_as_data_access() {
        let mut listed = provider();
        listed.malformed = vec![MalformedArticle {
            article_id: ArticleId("A-0".to_string()),
            message: "invalid decimal `abc`".to_string(),
        }];
        let report = advisor(listed)
            .analyze(&CategoryId("C-1".to_string()), as_of())
            .await
            .expect("siblings are still scored");

        assert_eq!(report.results.len(), 2);
        let classes: Vec<(&str, &str)> = report
            .skipped
            .iter()
            .map(|s| (s.article_id.0.as_str(), s.error_class.as_str()))
            .collect();
        assert_eq!(classes, vec![("A-0", "data_access"), ("A-2", "invalid_price")]);
    }

    #[tokio::test]
    async fn single_article_analysis_reports_missing_and_unusable_articles() {
        let advisor = advisor(provider());
        let result =
            advisor.analyze_article(&ArticleId("A-1".to_string()), as_of()).await.expect("scored");
        assert_eq!(result.article_id.0, "A-1");
        assert_eq!(result.prediction_method, PredictionMethod::Classic);

        let missing = advisor
            .analyze_article(&ArticleId("A-404".to_string()), as_of())
            .await
            .expect_err("unknown article");
        assert_eq!(missing.error_class(), "data_not_found");

        let zero_price = advisor
            .analyze_article(&ArticleId("A-2".to_string()), as_of())
            .await
            .expect_err("non-positive price");
        assert_eq!(zero_price.error_class(), "data_access");
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let advisor = advisor(provider());
        let error = advisor
            .analyze(&CategoryId("missing".to_string()), as_of())
            .await
            .expect_err("missing category");
        assert_eq!(error.error_class(), "data_not_found");
    }

    #[tokio::test]
    async fn unavailable_provider_aborts_the_run() {
        let mut failing = provider();
        failing.fail_sales = true;
        let error = advisor(failing)
            .analyze(&CategoryId("C-1".to_string()), as_of())
            .await
            .expect_err("provider failure");
        assert_eq!(error.error_class(), "data_access");
    }

    #[tokio::test]
    async fn insufficient_history_keeps_predictor_untrained() {
        let mut advisor = advisor(provider());
        let error = advisor
            .train(TrainingScope::Category(CategoryId("C-1".to_string())), as_of())
            .await
            .expect_err("no promotions");

        assert!(matches!(error, AdvisorError::InsufficientData { available: 0, .. }));
        assert_eq!(advisor.model_status().state, ModelState::Untrained);
        assert!(advisor.store().load_current().await.expect("store").is_none());
    }

    #[tokio::test]
    async fn simulated_training_switches_to_ai_path() {
        let mut advisor = advisor(provider());
        let report = advisor.train_simulated(120, as_of()).await.expect("trained");

        assert!(report.simulated);
        assert_eq!(report.candidates.iter().filter(|c| c.selected).count(), 1);
        assert_eq!(advisor.model_status().state, ModelState::Trained);

        let analysis =
            advisor.analyze(&CategoryId("C-1".to_string()), as_of()).await.expect("report");
        assert!(analysis.model.is_some());
        assert!(analysis.results.iter().all(|r| r.prediction_method == PredictionMethod::Ai));
    }

    #[tokio::test]
    async fn load_model_restores_saved_model() {
        let mut trained = advisor(provider());
        trained.train_simulated(80, as_of()).await.expect("trained");
        let saved = trained.store().load_current().await.expect("store").expect("model");

        let store = MemoryStore { current: Mutex::new(Some(saved)) };
        let mut fresh =
            PromotionAdvisor::new(provider(), store, AdvisorSettings::default()).expect("settings");
        assert!(matches!(fresh.load_model().await, PredictorState::Trained(_)));
    }

    #[test]
    fn settings_from_config_renormalise_weights() {
        let mut config = AppConfig::default();
        config.scoring.rotation_weight = 2.0;
        config.scoring.elasticity_weight = 1.0;
        config.scoring.sales_trend_weight = 1.0;
        config.scoring.promotion_fatigue_weight = 0.0;

        let settings = AdvisorSettings::from_config(&config).expect("settings");
        assert!((settings.weights.sum() - 1.0).abs() < 1e-12);
        assert!((settings.weights.rotation - 0.5).abs() < 1e-12);
    }
}

//! Candidate fitting and model selection.

use std::cmp::Ordering;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::training::TrainingDataset;
use super::{
    FeatureSchema, ModelError, ModelFamily, ModelMetrics, RegressionModel, Regressor,
    StandardScaler, TrainedModel,
};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum TrainingError {
    #[error("insufficient training data: {available} usable examples, {required} required ({excluded} excluded)")]
    InsufficientData { available: usize, required: usize, excluded: usize },
    #[error("no candidate model could be trained: {0}")]
    NoViableModel(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerSettings {
    pub min_examples: usize,
    pub holdout_ratio: f64,
    pub seed: u64,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self { min_examples: 20, holdout_ratio: 0.2, seed: 42 }
    }
}

/// Outcome of one family on the held-out partition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub family: ModelFamily,
    pub metrics: Option<ModelMetrics>,
    pub error: Option<String>,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub candidates: Vec<CandidateReport>,
    pub train_size: usize,
    pub holdout_size: usize,
    pub excluded: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ModelTrainer {
    settings: TrainerSettings,
}

impl ModelTrainer {
    pub fn new(settings: TrainerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Fit every family on the train partition and keep the best held-out
    /// `r2`, ties broken by lower `rmse`.
    pub fn train(&self, dataset: &TrainingDataset) -> Result<TrainingOutcome, TrainingError> {
        let available = dataset.len();
        let required = self.settings.min_examples.max(3);
        if available < required {
            return Err(TrainingError::InsufficientData {
                available,
                required,
                excluded: dataset.excluded_count(),
            });
        }

        let (train_idx, holdout_idx) = self.split(available);
        let rows = dataset.rows();
        let labels = dataset.labels();

        let pick = |indices: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
            indices.iter().map(|i| (rows[*i].clone(), labels[*i])).unzip()
        };
        let (train_rows, train_labels) = pick(&train_idx);
        let (holdout_rows, holdout_labels) = pick(&holdout_idx);

        let scaler = StandardScaler::fit(&train_rows)?;
        let train_scaled = scaler.transform_all(&train_rows)?;
        let holdout_scaled = scaler.transform_all(&holdout_rows)?;

        let mut candidates = Vec::with_capacity(ModelFamily::ALL.len());
        let mut fitted: Vec<(RegressionModel, ModelMetrics)> = Vec::new();
        for family in ModelFamily::ALL {
            let mut model = RegressionModel::untrained(family, self.settings.seed);
            let result = model
                .fit(&train_scaled, &train_labels)
                .and_then(|()| model.evaluate(&holdout_scaled, &holdout_labels));

            match result {
                Ok(metrics) => {
                    info!(
                        event_name = "training.candidate_evaluated",
                        model_family = %family,
                        r2 = metrics.r2,
                        rmse = metrics.rmse,
                        mae = metrics.mae,
                        "candidate evaluated"
                    );
                    candidates.push(CandidateReport {
                        family,
                        metrics: Some(metrics),
                        error: None,
                        selected: false,
                    });
                    fitted.push((model, metrics));
                }
                Err(error) => {
                    warn!(
                        event_name = "training.candidate_failed",
                        model_family = %family,
                        error = %error,
                        "candidate failed"
                    );
                    candidates.push(CandidateReport {
                        family,
                        metrics: None,
                        error: Some(error.to_string()),
                        selected: false,
                    });
                }
            }
        }

        let best = fitted
            .into_iter()
            .reduce(|best, challenger| {
                if compare_candidates(&challenger.1, &best.1) == Ordering::Greater {
                    challenger
                } else {
                    best
                }
            })
            .ok_or_else(|| {
                let reasons: Vec<String> = candidates
                    .iter()
                    .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {e}", c.family)))
                    .collect();
                TrainingError::NoViableModel(reasons.join("; "))
            })?;

        let (model, metrics) = best;
        for candidate in &mut candidates {
            candidate.selected = candidate.family == model.family();
        }

        Ok(TrainingOutcome {
            model: TrainedModel {
                id: Uuid::new_v4(),
                model,
                scaler,
                metrics,
                schema: FeatureSchema::current(),
                trained_at: Utc::now(),
                training_samples: train_idx.len(),
            },
            candidates,
            train_size: train_idx.len(),
            holdout_size: holdout_idx.len(),
            excluded: dataset.excluded_count(),
        })
    }

    /// Seeded shuffle into train and held-out index sets; both non-empty.
    fn split(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        indices.shuffle(&mut rng);

        let holdout = ((n as f64) * self.settings.holdout_ratio).round() as usize;
        let holdout = holdout.clamp(1, n.saturating_sub(2).max(1));
        let train = indices.split_off(holdout);
        (train, indices)
    }
}

/// Higher `r2` wins, then lower `rmse`. Non-finite metrics always lose.
fn compare_candidates(a: &ModelMetrics, b: &ModelMetrics) -> Ordering {
    let finite = |m: &ModelMetrics| m.r2.is_finite() && m.rmse.is_finite();
    match (finite(a), finite(b)) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => return Ordering::Equal,
        (true, true) => {}
    }
    a.r2.total_cmp(&b.r2).then_with(|| b.rmse.total_cmp(&a.rmse))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::article::ArticleId;
    use crate::features::FeatureVector;
    use crate::ml::training::TrainingExample;

    fn dataset(n: usize) -> TrainingDataset {
        let examples = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                let features =
                    FeatureVector::from_array([t, (t * 3.0).fract(), 1.0 - t, (t * 7.0).fract()]);
                TrainingExample {
                    article_id: ArticleId(format!("A-{i}")),
                    promotion_id: format!("P-{i}"),
                    starts_on: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
                    features,
                    label: 80.0 * t - 20.0 * features.promotion_fatigue_score,
                }
            })
            .collect();
        TrainingDataset::from_examples(examples)
    }

    #[test]
    fn too_few_examples_is_insufficient_data() {
        let trainer = ModelTrainer::default();
        let error = trainer.train(&dataset(5)).expect_err("must fail");
        assert_eq!(error, TrainingError::InsufficientData { available: 5, required: 20, excluded: 0 });
    }

    #[test]
    fn reports_all_three_candidates_and_selects_one() {
        let outcome = ModelTrainer::default().train(&dataset(60)).expect("train");

        assert_eq!(outcome.candidates.len(), 3);
        assert_eq!(outcome.candidates.iter().filter(|c| c.selected).count(), 1);
        assert_eq!(outcome.holdout_size, 12);
        assert_eq!(outcome.train_size, 48);
        assert_eq!(outcome.model.training_samples, 48);
        assert!(outcome.model.schema.matches_current());

        let selected = outcome.candidates.iter().find(|c| c.selected).expect("selected");
        for candidate in &outcome.candidates {
            let r2 = candidate.metrics.expect("metrics").r2;
            assert!(selected.metrics.expect("metrics").r2 >= r2);
        }
    }

    #[test]
    fn selection_is_deterministic_for_a_seed() {
        let data = dataset(50);
        let trainer = ModelTrainer::new(TrainerSettings { seed: 9, ..TrainerSettings::default() });

        let first = trainer.train(&data).expect("train");
        for _ in 0..3 {
            let again = trainer.train(&data).expect("train");
            assert_eq!(again.model.family(), first.model.family());
            assert_eq!(again.model.model, first.model.model);
            assert_eq!(again.candidates, first.candidates);
        }
    }

    #[test]
    fn ties_break_on_rmse() {
        let a = ModelMetrics { r2: 0.5, rmse: 2.0, mae: 1.0, sample_count: 4 };
        let b = ModelMetrics { r2: 0.5, rmse: 3.0, mae: 1.0, sample_count: 4 };
        let c = ModelMetrics { r2: f64::NAN, rmse: 0.1, mae: 0.1, sample_count: 4 };

        assert_eq!(compare_candidates(&a, &b), Ordering::Greater);
        assert_eq!(compare_candidates(&b, &a), Ordering::Less);
        assert_eq!(compare_candidates(&c, &b), Ordering::Less);
    }

    #[test]
    fn split_keeps_both_partitions_non_empty() {
        let trainer = ModelTrainer::new(TrainerSettings { holdout_ratio: 0.01, ..Default::default() });
        let (train, holdout) = trainer.split(10);
        assert_eq!(holdout.len(), 1);
        assert_eq!(train.len(), 9);
    }
}

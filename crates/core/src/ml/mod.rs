//! Promotion outcome regression
//!
//! Three interchangeable regressor families behind one [`Regressor`] contract,
//! the scaling transform fitted alongside them, and the persisted
//! [`TrainedModel`] envelope that ties a fitted model to the feature schema it
//! was trained on. Everything here is deterministic given the same data and
//! seed, so training runs are reproducible and auditable.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod selection;
pub mod simulation;
pub mod store;
pub mod training;
pub mod tree;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::features::FeatureVector;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use linear::LinearRegression;

/// Bumped whenever feature semantics change, even if the names stay the same.
pub const FEATURE_SCHEMA_VERSION: &str = "promolift.features.v1";

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ModelError {
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,
    #[error("feature rows ({rows}) and labels ({labels}) differ in length")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model has not been fitted")]
    NotFitted,
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("normal equations are singular")]
    Singular,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LinearRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] =
        [ModelFamily::LinearRegression, ModelFamily::RandomForest, ModelFamily::GradientBoosting];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.as_str() == value)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Held-out evaluation of a fitted regressor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    pub sample_count: usize,
}

impl ModelMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self, ModelError> {
        if actual.len() != predicted.len() {
            return Err(ModelError::LengthMismatch { rows: predicted.len(), labels: actual.len() });
        }
        if actual.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        let n = actual.len() as f64;
        let mean = actual.iter().sum::<f64>() / n;
        let mut squared_error = 0.0;
        let mut absolute_error = 0.0;
        let mut total_variance = 0.0;
        for (y, y_hat) in actual.iter().zip(predicted) {
            let residual = y - y_hat;
            squared_error += residual * residual;
            absolute_error += residual.abs();
            total_variance += (y - mean) * (y - mean);
        }

        // Constant targets have no variance to explain.
        let r2 = if total_variance <= f64::EPSILON {
            if squared_error <= f64::EPSILON {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - squared_error / total_variance
        };

        let metrics = Self {
            r2,
            rmse: (squared_error / n).sqrt(),
            mae: absolute_error / n,
            sample_count: actual.len(),
        };
        if !(metrics.r2.is_finite() && metrics.rmse.is_finite() && metrics.mae.is_finite()) {
            return Err(ModelError::NonFinite("metrics"));
        }
        Ok(metrics)
    }
}

/// Common contract of the regressor families. The trainer only talks to
/// models through this trait.
pub trait Regressor {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[f64]) -> Result<(), ModelError>;

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError>;

    fn evaluate(&self, rows: &[Vec<f64>], labels: &[f64]) -> Result<ModelMetrics, ModelError> {
        if rows.len() != labels.len() {
            return Err(ModelError::LengthMismatch { rows: rows.len(), labels: labels.len() });
        }
        let predicted = rows.iter().map(|row| self.predict(row)).collect::<Result<Vec<_>, _>>()?;
        ModelMetrics::compute(labels, &predicted)
    }
}

pub(crate) fn check_training_input(rows: &[Vec<f64>], labels: &[f64]) -> Result<usize, ModelError> {
    if rows.len() != labels.len() {
        return Err(ModelError::LengthMismatch { rows: rows.len(), labels: labels.len() });
    }
    let Some(first) = rows.first() else {
        return Err(ModelError::EmptyDataset);
    };
    let width = first.len();
    for row in rows {
        if row.len() != width {
            return Err(ModelError::ShapeMismatch { expected: width, actual: row.len() });
        }
        if row.iter().any(|value| !value.is_finite()) {
            return Err(ModelError::NonFinite("features"));
        }
    }
    if labels.iter().any(|label| !label.is_finite()) {
        return Err(ModelError::NonFinite("labels"));
    }
    Ok(width)
}

pub(crate) fn check_row(row: &[f64], expected: usize) -> Result<(), ModelError> {
    if row.len() != expected {
        return Err(ModelError::ShapeMismatch { expected, actual: row.len() });
    }
    if row.iter().any(|value| !value.is_finite()) {
        return Err(ModelError::NonFinite("features"));
    }
    Ok(())
}

/// Tagged dispatch over the three families; this is also the persisted form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum RegressionModel {
    LinearRegression(LinearRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl RegressionModel {
    /// Unfitted model of `family` with its default hyper-parameters.
    pub fn untrained(family: ModelFamily, seed: u64) -> Self {
        match family {
            ModelFamily::LinearRegression => Self::LinearRegression(LinearRegression::default()),
            ModelFamily::RandomForest => Self::RandomForest(RandomForest::with_seed(seed)),
            ModelFamily::GradientBoosting => Self::GradientBoosting(GradientBoosting::default()),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Self::LinearRegression(_) => ModelFamily::LinearRegression,
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
        }
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            Self::LinearRegression(model) => model,
            Self::RandomForest(model) => model,
            Self::GradientBoosting(model) => model,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Self::LinearRegression(model) => model,
            Self::RandomForest(model) => model,
            Self::GradientBoosting(model) => model,
        }
    }
}

impl Regressor for RegressionModel {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[f64]) -> Result<(), ModelError> {
        self.as_regressor_mut().fit(rows, labels)
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        self.as_regressor().predict(row)
    }
}

/// Per-feature standardisation `(x - mean) / std`, fitted on the training
/// partition only and reused unchanged at inference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ModelError> {
        let Some(first) = rows.first() else {
            return Err(ModelError::EmptyDataset);
        };
        let width = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            check_row(row, width)?;
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value / n;
            }
        }

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((scale, mean), value) in scales.iter_mut().zip(&means).zip(row) {
                *scale += (value - mean) * (value - mean) / n;
            }
        }
        for scale in &mut scales {
            *scale = scale.sqrt();
            // constant columns pass through centred
            if *scale <= f64::EPSILON {
                *scale = 1.0;
            }
        }

        Ok(Self { means, scales })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_row(row, self.width())?;
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }

    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}

/// Names, order and version of the model inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: String,
    pub feature_names: Vec<String>,
    pub fingerprint: String,
}

impl FeatureSchema {
    /// Schema produced by the current feature extractor.
    pub fn current() -> Self {
        Self::new(FEATURE_SCHEMA_VERSION, FeatureVector::NAMES.iter().map(|name| name.to_string()))
    }

    pub fn new(version: &str, feature_names: impl IntoIterator<Item = String>) -> Self {
        let feature_names: Vec<String> = feature_names.into_iter().collect();
        let fingerprint = schema_fingerprint(version, &feature_names);
        Self { version: version.to_string(), feature_names, fingerprint }
    }

    pub fn matches_current(&self) -> bool {
        self.fingerprint == Self::current().fingerprint
    }
}

pub fn schema_fingerprint(version: &str, feature_names: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for name in feature_names {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
    }
    format!("sha256:{:x}", hasher.finalize())
}

/// A fitted model together with everything needed to apply it later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub id: Uuid,
    pub model: RegressionModel,
    pub scaler: StandardScaler,
    pub metrics: ModelMetrics,
    pub schema: FeatureSchema,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
}

impl TrainedModel {
    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }

    /// Scale `row` and apply the model, rejecting non-finite output.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        let scaled = self.scaler.transform(row)?;
        let prediction = self.model.predict(&scaled)?;
        if !prediction.is_finite() {
            return Err(ModelError::NonFinite("prediction"));
        }
        Ok(prediction)
    }

    pub fn predict_features(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.predict_row(&features.to_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_for_perfect_prediction() {
        let metrics = ModelMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).expect("metrics");
        assert_eq!(metrics.r2, 1.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.sample_count, 3);
    }

    #[test]
    fn metrics_for_mean_prediction_have_zero_r2() {
        let metrics = ModelMetrics::compute(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]).expect("metrics");
        assert!(metrics.r2.abs() < 1e-12);
        assert!((metrics.mae - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn metrics_reject_mismatched_lengths() {
        assert!(matches!(
            ModelMetrics::compute(&[1.0], &[1.0, 2.0]),
            Err(ModelError::LengthMismatch { .. })
        ));
        assert_eq!(ModelMetrics::compute(&[], &[]), Err(ModelError::EmptyDataset));
    }

    #[test]
    fn scaler_standardises_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).expect("scaler");

        assert_eq!(scaler.means, vec![2.0, 5.0]);
        assert_eq!(scaler.scales, vec![1.0, 1.0]);
        assert_eq!(scaler.transform(&[3.0, 5.0]).expect("row"), vec![1.0, 0.0]);
        assert_eq!(
            scaler.transform(&[1.0]),
            Err(ModelError::ShapeMismatch { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn schema_fingerprint_depends_on_order_and_version() {
        let current = FeatureSchema::current();
        assert!(current.matches_current());
        assert!(current.fingerprint.starts_with("sha256:"));

        let mut reordered: Vec<String> = current.feature_names.clone();
        reordered.swap(0, 1);
        assert_ne!(FeatureSchema::new(FEATURE_SCHEMA_VERSION, reordered).fingerprint, current.fingerprint);

        let bumped = FeatureSchema::new("promolift.features.v0", current.feature_names.clone());
        assert!(!bumped.matches_current());
    }

    #[test]
    fn family_names_round_trip() {
        for family in ModelFamily::ALL {
            assert_eq!(ModelFamily::parse(family.as_str()), Some(family));
            let json = serde_json::to_string(&family).expect("serialize");
            assert_eq!(json, format!("\"{}\"", family.as_str()));
        }
        assert_eq!(ModelFamily::parse("svm"), None);
    }

    #[test]
    fn every_family_fits_a_linear_signal() {
        let rows: Vec<Vec<f64>> =
            (0..60).map(|i| vec![f64::from(i) / 60.0, f64::from(i % 7) / 7.0]).collect();
        let labels: Vec<f64> = rows.iter().map(|row| 10.0 * row[0] + 2.0).collect();

        for family in ModelFamily::ALL {
            let mut model = RegressionModel::untrained(family, 7);
            model.fit(&rows, &labels).expect("fit");
            assert_eq!(model.family(), family);

            let metrics = model.evaluate(&rows, &labels).expect("evaluate");
            assert!(metrics.r2 > 0.9, "{family} r2 {}", metrics.r2);
        }
    }

    #[test]
    fn tagged_model_serialises_with_family() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let labels: Vec<f64> = (0..10).map(f64::from).collect();
        let mut model = RegressionModel::untrained(ModelFamily::LinearRegression, 0);
        model.fit(&rows, &labels).expect("fit");

        let json = serde_json::to_value(&model).expect("serialize");
        assert_eq!(json["family"], "linear_regression");

        let restored: RegressionModel = serde_json::from_value(json).expect("deserialize");
        assert_eq!(restored, model);
    }
}

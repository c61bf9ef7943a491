//! Predictor state machine
//!
//! `Untrained` until a model whose schema fingerprint matches the current
//! feature extractor is installed. Every prediction returns a usable result:
//! when untrained, or when applying the model fails, the classic scorer
//! answers and the result is tagged [`PredictionMethod::Classic`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::features::FeatureVector;
use crate::ml::{FeatureSchema, ModelError, TrainedModel};
use crate::scoring::{ClassicScore, ClassicScorer, PromotionBounds};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    Ai,
    Classic,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Classic => "classic",
        }
    }
}

impl fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UntrainedReason {
    NoModel,
    Stale { expected_fingerprint: String, model_fingerprint: String },
    LoadFailed { message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum PredictorState {
    Untrained(UntrainedReason),
    Trained(Box<TrainedModel>),
}

/// Failure applying a trained model. Always recovered by the classic path.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PredictionError {
    #[error("predictor is untrained")]
    Untrained,
    #[error("model application failed: {0}")]
    Application(#[from] ModelError),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub method: PredictionMethod,
    /// Position of `promotion_pct` inside the bounds for the AI path, the
    /// weighted score for the classic path.
    pub final_score: f64,
    pub promotion_pct: u32,
    pub classic: ClassicScore,
    /// Raw model output in outcome points, when the AI path ran.
    pub model_output: Option<f64>,
}

/// Map a predicted outcome onto a discount: negative outcomes earn small
/// discounts growing with their magnitude, positive ones shrink the discount
/// from the maximum.
pub fn outcome_to_promotion_pct(outcome: f64, bounds: &PromotionBounds) -> u32 {
    let raw = if outcome < 0.0 {
        f64::from(bounds.min_promotion_pct) + outcome.abs() * 0.5
    } else {
        f64::from(bounds.max_promotion_pct) - outcome * 0.3
    };
    bounds.clamp_pct(raw)
}

#[derive(Clone, Debug)]
pub struct Predictor {
    scorer: ClassicScorer,
    state: PredictorState,
}

impl Predictor {
    pub fn new(scorer: ClassicScorer) -> Self {
        Self { scorer, state: PredictorState::Untrained(UntrainedReason::NoModel) }
    }

    pub fn with_model(scorer: ClassicScorer, model: TrainedModel) -> Self {
        let mut predictor = Self::new(scorer);
        predictor.install(model);
        predictor
    }

    pub fn scorer(&self) -> &ClassicScorer {
        &self.scorer
    }

    pub fn state(&self) -> &PredictorState {
        &self.state
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, PredictorState::Trained(_))
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        match &self.state {
            PredictorState::Trained(model) => Some(model.as_ref()),
            PredictorState::Untrained(_) => None,
        }
    }

    /// Untrained -> Trained when the model matches the current schema; a
    /// stale model leaves the predictor untrained.
    pub fn install(&mut self, model: TrainedModel) -> &PredictorState {
        let current = FeatureSchema::current();
        if model.schema.fingerprint != current.fingerprint {
            warn!(
                event_name = "predictor.model_stale",
                model_id = %model.id,
                model_family = %model.family(),
                expected = %current.fingerprint,
                found = %model.schema.fingerprint,
                "persisted model was trained on a different feature schema; using classic scoring"
            );
            self.state = PredictorState::Untrained(UntrainedReason::Stale {
                expected_fingerprint: current.fingerprint,
                model_fingerprint: model.schema.fingerprint,
            });
        } else {
            self.state = PredictorState::Trained(Box::new(model));
        }
        &self.state
    }

    pub fn mark_untrained(&mut self, reason: UntrainedReason) {
        self.state = PredictorState::Untrained(reason);
    }

    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let classic = self.scorer.score(features);

        match self.apply_model(features) {
            Ok((output, promotion_pct)) => {
                let bounds = self.scorer.bounds();
                let final_score =
                    f64::from(promotion_pct - bounds.min_promotion_pct) / bounds.span();
                Prediction {
                    method: PredictionMethod::Ai,
                    final_score,
                    promotion_pct,
                    classic,
                    model_output: Some(output),
                }
            }
            Err(error) => {
                if !matches!(error, PredictionError::Untrained) {
                    warn!(
                        event_name = "predictor.fallback",
                        error = %error,
                        "model application failed; falling back to classic scoring"
                    );
                } else {
                    debug!(event_name = "predictor.classic", "no usable model; classic scoring");
                }
                Prediction {
                    method: PredictionMethod::Classic,
                    final_score: classic.final_score,
                    promotion_pct: classic.promotion_pct,
                    classic,
                    model_output: None,
                }
            }
        }
    }

    fn apply_model(&self, features: &FeatureVector) -> Result<(f64, u32), PredictionError> {
        let PredictorState::Trained(model) = &self.state else {
            return Err(PredictionError::Untrained);
        };
        let output = model.predict_features(features)?;
        Ok((output, outcome_to_promotion_pct(output, self.scorer.bounds())))
    }
}

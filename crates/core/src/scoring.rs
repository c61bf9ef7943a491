//! Classic weighted scoring
//!
//! Combines a [`FeatureVector`] into a single score with fixed weights and maps
//! it linearly onto the configured promotion range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{bounded, FeatureVector};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ScoringError {
    #[error("score weight `{name}` must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("score weights must not all be zero")]
    ZeroWeightSum,
    #[error("promotion bounds must satisfy 0 <= min < max <= 100, got min={min} max={max}")]
    InvalidBounds { min: u32, max: u32 },
}

/// Weights for the four feature scores
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight for stock rotation (default: 0.35)
    pub rotation: f64,
    /// Weight for price elasticity (default: 0.25)
    pub elasticity: f64,
    /// Weight for sales trend (default: 0.25)
    pub sales_trend: f64,
    /// Weight for promotion headroom, `1 - fatigue` (default: 0.15)
    pub promotion_fatigue: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { rotation: 0.35, elasticity: 0.25, sales_trend: 0.25, promotion_fatigue: 0.15 }
    }
}

impl ScoreWeights {
    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("rotation", self.rotation),
            ("elasticity", self.elasticity),
            ("sales_trend", self.sales_trend),
            ("promotion_fatigue", self.promotion_fatigue),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.named().iter().map(|(_, weight)| weight).sum()
    }

    /// Validates the weights and rescales them to sum to `1.0`.
    pub fn normalized(&self) -> Result<Self, ScoringError> {
        for (name, value) in self.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidWeight { name, value });
            }
        }

        let sum = self.sum();
        if sum <= 0.0 {
            return Err(ScoringError::ZeroWeightSum);
        }
        if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            return Ok(*self);
        }

        Ok(Self {
            rotation: self.rotation / sum,
            elasticity: self.elasticity / sum,
            sales_trend: self.sales_trend / sum,
            promotion_fatigue: self.promotion_fatigue / sum,
        })
    }
}

/// Inclusive range of recommended discounts, in percent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionBounds {
    pub min_promotion_pct: u32,
    pub max_promotion_pct: u32,
}

impl Default for PromotionBounds {
    fn default() -> Self {
        Self { min_promotion_pct: 5, max_promotion_pct: 50 }
    }
}

impl PromotionBounds {
    pub fn new(min_promotion_pct: u32, max_promotion_pct: u32) -> Result<Self, ScoringError> {
        let bounds = Self { min_promotion_pct, max_promotion_pct };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.min_promotion_pct >= self.max_promotion_pct || self.max_promotion_pct > 100 {
            return Err(ScoringError::InvalidBounds {
                min: self.min_promotion_pct,
                max: self.max_promotion_pct,
            });
        }
        Ok(())
    }

    pub fn span(&self) -> f64 {
        f64::from(self.max_promotion_pct - self.min_promotion_pct)
    }

    /// Round and clamp a fractional percentage into the bounds.
    pub fn clamp_pct(&self, pct: f64) -> u32 {
        let min = f64::from(self.min_promotion_pct);
        let max = f64::from(self.max_promotion_pct);
        if pct.is_nan() {
            return self.min_promotion_pct;
        }
        pct.round().clamp(min, max) as u32
    }

    /// Linear map of a `[0, 1]` score onto the range.
    pub fn pct_for_score(&self, score: f64) -> u32 {
        self.clamp_pct(bounded(score) * self.span() + f64::from(self.min_promotion_pct))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassicScore {
    pub final_score: f64,
    pub promotion_pct: u32,
}

/// Deterministic weighted scorer. Construction validates its inputs, so
/// scoring itself cannot fail.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassicScorer {
    weights: ScoreWeights,
    bounds: PromotionBounds,
}

impl ClassicScorer {
    pub fn new(weights: ScoreWeights, bounds: PromotionBounds) -> Result<Self, ScoringError> {
        bounds.validate()?;
        Ok(Self { weights: weights.normalized()?, bounds })
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn bounds(&self) -> &PromotionBounds {
        &self.bounds
    }

    pub fn final_score(&self, features: &FeatureVector) -> f64 {
        let weighted = self.weights.rotation * bounded(features.rotation_score)
            + self.weights.elasticity * bounded(features.elasticity_score)
            + self.weights.sales_trend * bounded(features.sales_trend_score)
            + self.weights.promotion_fatigue * (1.0 - bounded(features.promotion_fatigue_score));
        bounded(weighted)
    }

    pub fn score(&self, features: &FeatureVector) -> ClassicScore {
        let final_score = self.final_score(features);
        ClassicScore { final_score, promotion_pct: self.bounds.pct_for_score(final_score) }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassicScorer, PromotionBounds, ScoreWeights, ScoringError};
    use crate::features::FeatureVector;

    fn scorer() -> ClassicScorer {
        ClassicScorer::new(ScoreWeights::default(), PromotionBounds::default())
            .expect("default scorer is valid")
    }

    #[test]
    fn neutral_features_land_mid_range() {
        let score = scorer().score(&FeatureVector::neutral());
        // 0.35*0.5 + 0.25*0.5 + 0.25*0.5 + 0.15*(1 - 0.5)
        assert!((score.final_score - 0.5).abs() < 1e-12);
        assert_eq!(score.promotion_pct, 28);
    }

    #[test]
    fn extremes_map_to_bounds() {
        let scorer = scorer();
        let hot = FeatureVector::from_array([1.0, 1.0, 1.0, 0.0]);
        let cold = FeatureVector::from_array([0.0, 0.0, 0.0, 1.0]);

        assert_eq!(scorer.score(&hot).promotion_pct, 50);
        assert_eq!(scorer.score(&cold).promotion_pct, 5);
    }

    #[test]
    fn promotion_pct_stays_within_bounds_over_grid() {
        let scorer = ClassicScorer::new(
            ScoreWeights { rotation: 0.1, elasticity: 0.2, sales_trend: 0.3, promotion_fatigue: 0.4 },
            PromotionBounds::new(10, 35).expect("valid bounds"),
        )
        .expect("valid scorer");

        let steps = [0.0, 0.13, 0.5, 0.87, 1.0];
        for a in steps {
            for b in steps {
                for c in steps {
                    for d in steps {
                        let pct = scorer.score(&FeatureVector::from_array([a, b, c, d])).promotion_pct;
                        assert!((10..=35).contains(&pct), "pct {pct} for {a},{b},{c},{d}");
                    }
                }
            }
        }
    }

    #[test]
    fn weights_are_renormalized() {
        let weights = ScoreWeights {
            rotation: 7.0,
            elasticity: 5.0,
            sales_trend: 5.0,
            promotion_fatigue: 3.0,
        };
        let normalized = weights.normalized().expect("positive weights");

        assert!((normalized.sum() - 1.0).abs() < 1e-12);
        assert!((normalized.rotation - 0.35).abs() < 1e-12);
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let negative = ScoreWeights { rotation: -0.1, ..ScoreWeights::default() };
        assert!(matches!(
            negative.normalized(),
            Err(ScoringError::InvalidWeight { name: "rotation", .. })
        ));

        let zero = ScoreWeights {
            rotation: 0.0,
            elasticity: 0.0,
            sales_trend: 0.0,
            promotion_fatigue: 0.0,
        };
        assert_eq!(zero.normalized(), Err(ScoringError::ZeroWeightSum));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(PromotionBounds::new(20, 20).is_err());
        assert!(PromotionBounds::new(30, 10).is_err());
        assert!(PromotionBounds::new(0, 101).is_err());
        assert!(PromotionBounds::new(0, 100).is_ok());
    }

    #[test]
    fn clamp_pct_rounds_and_limits() {
        let bounds = PromotionBounds::default();
        assert_eq!(bounds.clamp_pct(12.4), 12);
        assert_eq!(bounds.clamp_pct(12.5), 13);
        assert_eq!(bounds.clamp_pct(-40.0), 5);
        assert_eq!(bounds.clamp_pct(400.0), 50);
        assert_eq!(bounds.clamp_pct(f64::NAN), 5);
    }
}

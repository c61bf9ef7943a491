//! Labelled dataset assembly from historical promotions.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::article::ArticleId;
use crate::domain::history::PromotionRecord;
use crate::features::{promotion_outcome, ArticleHistory, FeatureExtractor, FeatureVector};

/// Label bounds in outcome points.
pub const LABEL_FLOOR: f64 = -50.0;
pub const LABEL_CEILING: f64 = 200.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub article_id: ArticleId,
    pub promotion_id: String,
    pub starts_on: NaiveDate,
    pub features: FeatureVector,
    pub label: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    ZeroDuration,
    StillRunning,
    InvalidPrice,
    NoBaseline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedPromotion {
    pub article_id: ArticleId,
    pub promotion_id: String,
    pub reason: ExclusionReason,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub examples: Vec<TrainingExample>,
    pub excluded: Vec<ExcludedPromotion>,
}

impl TrainingDataset {
    pub fn from_examples(examples: Vec<TrainingExample>) -> Self {
        Self { examples, excluded: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn exclusion_counts(&self) -> BTreeMap<ExclusionReason, usize> {
        let mut counts = BTreeMap::new();
        for excluded in &self.excluded {
            *counts.entry(excluded.reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.examples.iter().map(|example| example.features.to_array().to_vec()).collect()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.examples.iter().map(|example| example.label).collect()
    }
}

/// Blended outcome in points: `100 * (0.6 * sales_lift + 0.4 * revenue_change)`,
/// clipped to `[-50, 200]`.
pub fn outcome_label(sales_lift: f64, revenue_change: f64) -> f64 {
    (100.0 * (0.6 * sales_lift + 0.4 * revenue_change)).clamp(LABEL_FLOOR, LABEL_CEILING)
}

#[derive(Clone, Debug, Default)]
pub struct TrainingDataBuilder {
    extractor: FeatureExtractor,
}

impl TrainingDataBuilder {
    pub fn new(extractor: FeatureExtractor) -> Self {
        Self { extractor }
    }

    /// One example per completed promotion. Features are computed as of the
    /// promotion start; promotions still running on `as_of` are excluded.
    pub fn build(&self, histories: &[ArticleHistory], as_of: NaiveDate) -> TrainingDataset {
        // no day follows NaiveDate::MAX, so nothing can still be running
        let cutoff = as_of.succ_opt();
        let mut dataset = TrainingDataset::default();

        for history in histories {
            let mut promotions: Vec<&PromotionRecord> = history.promotions.iter().collect();
            promotions.sort_by(|a, b| a.starts_on.cmp(&b.starts_on).then_with(|| a.id.cmp(&b.id)));

            for promo in promotions {
                match self.example_for(history, promo, cutoff) {
                    Ok(example) => dataset.examples.push(example),
                    Err(reason) => {
                        debug!(
                            event_name = "training.promotion_excluded",
                            article_id = %history.article.id,
                            promotion_id = %promo.id,
                            reason = ?reason,
                            "promotion excluded from training data"
                        );
                        dataset.excluded.push(ExcludedPromotion {
                            article_id: history.article.id.clone(),
                            promotion_id: promo.id.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        dataset
    }

    fn example_for(
        &self,
        history: &ArticleHistory,
        promo: &PromotionRecord,
        cutoff: Option<NaiveDate>,
    ) -> Result<TrainingExample, ExclusionReason> {
        if promo.duration_days() <= 0 {
            return Err(ExclusionReason::ZeroDuration);
        }
        if cutoff.is_some_and(|cutoff| promo.ends_on > cutoff) {
            return Err(ExclusionReason::StillRunning);
        }
        if promo.price_change_ratio().is_none() {
            return Err(ExclusionReason::InvalidPrice);
        }
        let outcome = promotion_outcome(promo, &history.sales, self.extractor.windows().baseline_days)
            .ok_or(ExclusionReason::NoBaseline)?;

        Ok(TrainingExample {
            article_id: history.article.id.clone(),
            promotion_id: promo.id.clone(),
            starts_on: promo.starts_on,
            features: self.extractor.extract(history, promo.starts_on),
            label: outcome_label(outcome.sales_lift, outcome.revenue_change),
        })
    }
}

//! Seeded synthetic promotion outcomes for training without history.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::training::{outcome_label, TrainingDataset, TrainingExample};
use crate::domain::article::ArticleId;
use crate::features::{rotation_score, FeatureVector};

pub const DEFAULT_SIMULATED_SAMPLES: usize = 200;

/// Generate `samples` examples. Demand response grows with elasticity and
/// shrinks with recent promotion fatigue.
pub fn simulated_dataset(samples: usize, seed: u64, starts_on: NaiveDate) -> TrainingDataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let examples = (0..samples)
        .map(|i| {
            let injected = f64::from(rng.gen_range(50u32..800));
            let base_sales = f64::from(rng.gen_range(10u32..80));
            let elasticity_score: f64 = rng.gen_range(0.1..0.9);
            let sales_trend_score: f64 = rng.gen_range(0.0..1.0);
            let promotion_fatigue_score: f64 = rng.gen_range(0.0..0.9);
            // past discounts were deeper for sensitive or declining articles
            let promotion_pct = 5.0
                + 40.0 * (0.5 * elasticity_score + 0.5 * sales_trend_score)
                + rng.gen_range(-3.0f64..3.0);

            let sensitivity = 1.5 + 1.875 * (elasticity_score - 0.1);
            let effect =
                1.0 + promotion_pct / 100.0 * sensitivity * (1.0 - 0.4 * promotion_fatigue_score);
            let sales_during = (base_sales * effect).round();

            let sales_lift = sales_during / base_sales - 1.0;
            let revenue_change = (1.0 - promotion_pct / 100.0) * sales_during / base_sales - 1.0;

            let features = FeatureVector::from_array([
                rotation_score(Some(base_sales / injected * 3.0)),
                elasticity_score,
                sales_trend_score,
                promotion_fatigue_score,
            ]);

            TrainingExample {
                article_id: ArticleId(format!("SIM-{}", i + 1)),
                promotion_id: format!("SIM-P-{}", i + 1),
                starts_on,
                features,
                label: outcome_label(sales_lift, revenue_change),
            }
        })
        .collect();

    TrainingDataset::from_examples(examples)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::simulated_dataset;
    use crate::ml::selection::ModelTrainer;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
    }

    #[test]
    fn same_seed_same_data() {
        let first = simulated_dataset(50, 42, start());
        let second = simulated_dataset(50, 42, start());
        let other = simulated_dataset(50, 7, start());

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.len(), 50);
    }

    #[test]
    fn simulated_examples_are_bounded_and_trainable() {
        let dataset = simulated_dataset(200, 42, start());
        for example in &dataset.examples {
            for value in example.features.to_array() {
                assert!((0.0..=1.0).contains(&value));
            }
            assert!((-50.0..=200.0).contains(&example.label));
        }

        let outcome = ModelTrainer::default().train(&dataset).expect("train");
        assert!(outcome.model.metrics.r2 > 0.5, "r2 {}", outcome.model.metrics.r2);
    }
}

//! Analysis output records and run summary.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::article::{ArticleId, CategoryId};
use crate::features::FeatureVector;
use crate::impact::{round2, ImpactEstimate, Recommendation, RiskLevel};
use crate::ml::{ModelFamily, ModelMetrics, TrainedModel};
use crate::predictor::PredictionMethod;

const TOP_OPPORTUNITIES: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub article_id: ArticleId,
    pub article_name: String,
    pub current_stock: i64,
    pub current_price: Decimal,
    pub discounted_price: Decimal,
    pub scores: FeatureVector,
    pub final_score: f64,
    pub promotion_pct: u32,
    /// What the weighted scorer alone would have recommended.
    pub classic_promotion_pct: u32,
    pub prediction_method: PredictionMethod,
    pub projected_sales: f64,
    pub projected_revenue: f64,
    pub impact: ImpactEstimate,
    pub recommendation: Recommendation,
    pub recommendation_message: String,
    pub risk_level: RiskLevel,
}

/// An article the batch could not score; siblings are unaffected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedArticle {
    pub article_id: ArticleId,
    pub error_class: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_id: Uuid,
    pub family: ModelFamily,
    pub metrics: ModelMetrics,
    pub trained_at: DateTime<Utc>,
    pub schema_fingerprint: String,
}

impl From<&TrainedModel> for ModelSummary {
    fn from(model: &TrainedModel) -> Self {
        Self {
            model_id: model.id,
            family: model.family(),
            metrics: model.metrics,
            trained_at: model.trained_at,
            schema_fingerprint: model.schema.fingerprint.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub article_id: ArticleId,
    pub article_name: String,
    pub promotion_pct: u32,
    pub revenue_change_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub article_id: ArticleId,
    pub article_name: String,
    pub current_stock: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub article_count: usize,
    pub average_promotion_pct: f64,
    pub total_revenue_change: f64,
    pub total_sales_volume_change: f64,
    /// Promotions above 30%.
    pub high_promotions: usize,
    /// Promotions from 15% to 30%.
    pub medium_promotions: usize,
    /// Promotions below 15%.
    pub low_promotions: usize,
    pub method_distribution: BTreeMap<PredictionMethod, usize>,
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub top_opportunities: Vec<Opportunity>,
    pub critical_stock_alerts: Vec<StockAlert>,
}

impl AnalysisSummary {
    pub fn from_results(results: &[PredictionResult], stock_critical: i64) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let mut summary = Self { article_count: results.len(), ..Self::default() };
        let mut promotion_total = 0.0;
        for result in results {
            promotion_total += f64::from(result.promotion_pct);
            summary.total_revenue_change += result.impact.revenue_change;
            summary.total_sales_volume_change += result.impact.sales_volume_change;

            match result.promotion_pct {
                pct if pct > 30 => summary.high_promotions += 1,
                pct if pct >= 15 => summary.medium_promotions += 1,
                _ => summary.low_promotions += 1,
            }
            *summary.method_distribution.entry(result.prediction_method).or_insert(0) += 1;
            *summary.risk_distribution.entry(result.risk_level).or_insert(0) += 1;

            if result.current_stock <= stock_critical {
                summary.critical_stock_alerts.push(StockAlert {
                    article_id: result.article_id.clone(),
                    article_name: result.article_name.clone(),
                    current_stock: result.current_stock,
                });
            }
        }
        summary.average_promotion_pct = round2(promotion_total / results.len() as f64);
        summary.total_revenue_change = round2(summary.total_revenue_change);
        summary.total_sales_volume_change = round2(summary.total_sales_volume_change);

        let mut ranked: Vec<&PredictionResult> = results.iter().collect();
        ranked.sort_by(|a, b| {
            b.impact
                .revenue_change_pct
                .total_cmp(&a.impact.revenue_change_pct)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        summary.top_opportunities = ranked
            .into_iter()
            .take(TOP_OPPORTUNITIES)
            .map(|result| Opportunity {
                article_id: result.article_id.clone(),
                article_name: result.article_name.clone(),
                promotion_pct: result.promotion_pct,
                revenue_change_pct: result.impact.revenue_change_pct,
            })
            .collect();

        summary
    }

    pub fn revenue_outlook_positive(&self) -> bool {
        self.total_revenue_change > 0.0
    }
}

/// One analysis run, ready to be written out or persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub category_id: CategoryId,
    pub category_name: String,
    /// Present only when at least one result took the AI path.
    pub model: Option<ModelSummary>,
    pub results: Vec<PredictionResult>,
    pub skipped: Vec<SkippedArticle>,
    pub summary: AnalysisSummary,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::impact::{ImpactEstimator, ImpactInputs};

    fn result(id: &str, promotion_pct: u32, stock: i64, method: PredictionMethod) -> PredictionResult {
        let impact = ImpactEstimator::default().estimate(&ImpactInputs {
            promotion_pct,
            current_price: 100.0,
            discounted_price: 100.0 - f64::from(promotion_pct),
            current_stock: stock,
            elasticity_score: 0.5,
            baseline_daily_sales: Some(2.0),
            baseline_daily_revenue: Some(200.0),
        });
        PredictionResult {
            article_id: ArticleId(id.to_string()),
            article_name: format!("Article {id}"),
            current_stock: stock,
            current_price: Decimal::new(100, 0),
            discounted_price: Decimal::from(100 - promotion_pct),
            scores: FeatureVector::neutral(),
            final_score: 0.5,
            promotion_pct,
            classic_promotion_pct: promotion_pct,
            prediction_method: method,
            projected_sales: impact.projected_sales_volume,
            projected_revenue: impact.projected_revenue,
            impact,
            recommendation: Recommendation::Neutral,
            recommendation_message: String::new(),
            risk_level: RiskLevel::assess(stock, promotion_pct, &impact),
        }
    }

    #[test]
    fn empty_results_give_empty_summary() {
        let summary = AnalysisSummary::from_results(&[], 10);
        assert_eq!(summary.article_count, 0);
        assert!(summary.top_opportunities.is_empty());
    }

    #[test]
    fn summary_buckets_and_distributions() {
        let results = vec![
            result("A", 40, 50, PredictionMethod::Ai),
            result("B", 30, 8, PredictionMethod::Classic),
            result("C", 15, 50, PredictionMethod::Classic),
            result("D", 10, 50, PredictionMethod::Classic),
        ];
        let summary = AnalysisSummary::from_results(&results, 10);

        assert_eq!(summary.article_count, 4);
        assert_eq!(summary.average_promotion_pct, 23.75);
        assert_eq!((summary.high_promotions, summary.medium_promotions, summary.low_promotions), (1, 2, 1));
        assert_eq!(summary.method_distribution.get(&PredictionMethod::Classic), Some(&3));
        assert_eq!(summary.method_distribution.get(&PredictionMethod::Ai), Some(&1));
        assert_eq!(summary.critical_stock_alerts.len(), 1);
        assert_eq!(summary.critical_stock_alerts[0].article_id.0, "B");
    }

    #[test]
    fn top_opportunities_are_ranked_by_revenue_change() {
        let results: Vec<PredictionResult> = [5, 10, 15, 20, 25, 30, 35]
            .iter()
            .enumerate()
            .map(|(i, pct)| result(&format!("A{i}"), *pct, 50, PredictionMethod::Classic))
            .collect();
        let summary = AnalysisSummary::from_results(&results, 10);

        assert_eq!(summary.top_opportunities.len(), 5);
        for pair in summary.top_opportunities.windows(2) {
            assert!(pair[0].revenue_change_pct >= pair[1].revenue_change_pct);
        }
    }

    #[test]
    fn summary_serialises_enum_keyed_maps() {
        let results = vec![result("A", 20, 50, PredictionMethod::Ai)];
        let summary = AnalysisSummary::from_results(&results, 10);
        let json = serde_json::to_value(&summary).expect("json");

        assert_eq!(json["method_distribution"]["ai"], 1);
        let restored: AnalysisSummary = serde_json::from_value(json).expect("round trip");
        assert_eq!(restored, summary);
    }
}

//! Feature extraction
//!
//! Turns the raw history of one article into four bounded scores. Every score
//! lies in `[0.0, 1.0]`; degenerate inputs (empty windows, zero denominators)
//! fall back to the neutral defaults documented on each method instead of
//! producing an error.

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::article::ArticleSnapshot;
use crate::domain::history::{
    injected_in, revenue_in, units_in, DateWindow, InjectionRecord, PromotionRecord, SalesRecord,
};

/// Score used whenever the underlying data cannot support a measurement.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Minimum sales rows before the price/quantity correlation fallback is trusted.
const MIN_CORRELATION_RECORDS: usize = 10;
/// Minimum usable period-over-period change pairs for the correlation fallback.
const MIN_CORRELATION_PAIRS: usize = 5;

/// Per-article scores at one analysis instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub rotation_score: f64,
    pub elasticity_score: f64,
    pub sales_trend_score: f64,
    pub promotion_fatigue_score: f64,
}

impl FeatureVector {
    /// Feature names in model input order.
    pub const NAMES: [&'static str; 4] =
        ["rotation_score", "elasticity_score", "sales_trend_score", "promotion_fatigue_score"];

    pub fn neutral() -> Self {
        Self {
            rotation_score: NEUTRAL_SCORE,
            elasticity_score: NEUTRAL_SCORE,
            sales_trend_score: NEUTRAL_SCORE,
            promotion_fatigue_score: NEUTRAL_SCORE,
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [
            self.rotation_score,
            self.elasticity_score,
            self.sales_trend_score,
            self.promotion_fatigue_score,
        ]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            rotation_score: bounded(values[0]),
            elasticity_score: bounded(values[1]),
            sales_trend_score: bounded(values[2]),
            promotion_fatigue_score: bounded(values[3]),
        }
    }
}

/// Clamp to `[0, 1]`, mapping NaN to the neutral score.
pub fn bounded(value: f64) -> f64 {
    if value.is_nan() {
        NEUTRAL_SCORE
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Look-back lengths used by the extractor, in days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureWindows {
    pub sales_window_days: u32,
    pub promotion_lookback_days: u32,
    pub fatigue_half_life_days: u32,
    pub baseline_days: u32,
}

impl Default for FeatureWindows {
    fn default() -> Self {
        Self {
            sales_window_days: 90,
            promotion_lookback_days: 180,
            fatigue_half_life_days: 60,
            baseline_days: 30,
        }
    }
}

/// Everything the extractor may look at for one article.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleHistory {
    pub article: ArticleSnapshot,
    pub sales: Vec<SalesRecord>,
    pub injections: Vec<InjectionRecord>,
    pub promotions: Vec<PromotionRecord>,
}

impl ArticleHistory {
    pub fn new(article: ArticleSnapshot) -> Self {
        Self { article, sales: Vec::new(), injections: Vec::new(), promotions: Vec::new() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureExtractor {
    windows: FeatureWindows,
}

impl FeatureExtractor {
    pub fn new(windows: FeatureWindows) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &FeatureWindows {
        &self.windows
    }

    /// Sales window ending (exclusively) at `cutoff`.
    pub fn sales_window(&self, cutoff: NaiveDate) -> DateWindow {
        DateWindow::trailing(cutoff, self.windows.sales_window_days)
    }

    /// Compute all four scores using only records dated strictly before `cutoff`.
    pub fn extract(&self, history: &ArticleHistory, cutoff: NaiveDate) -> FeatureVector {
        let window = self.sales_window(cutoff);
        let visible_sales: Vec<SalesRecord> =
            history.sales.iter().filter(|sale| sale.sold_on < cutoff).cloned().collect();

        let rate = rotation_rate(&visible_sales, &history.injections, window);
        FeatureVector {
            rotation_score: rotation_score(rate),
            elasticity_score: self.elasticity_score(&visible_sales, &history.promotions, cutoff),
            sales_trend_score: self.sales_trend_score(&visible_sales, cutoff),
            promotion_fatigue_score: self.promotion_fatigue_score(&history.promotions, cutoff),
        }
    }

    /// Average units sold per day over the sales window.
    pub fn daily_sales_rate(&self, sales: &[SalesRecord], cutoff: NaiveDate) -> Option<f64> {
        let window = self.sales_window(cutoff);
        if window.days() == 0 || !sales.iter().any(|sale| window.contains(sale.sold_on)) {
            return None;
        }
        Some(units_in(sales, window) as f64 / window.days() as f64)
    }

    /// Demand sensitivity from completed promotions, falling back to the
    /// price/quantity correlation of the sales series, then to `0.5`.
    pub fn elasticity_score(
        &self,
        sales: &[SalesRecord],
        promotions: &[PromotionRecord],
        cutoff: NaiveDate,
    ) -> f64 {
        let elasticities: Vec<f64> = promotions
            .iter()
            .filter(|promo| promo.ends_on <= cutoff)
            .filter_map(|promo| promotion_elasticity(promo, sales, self.windows.baseline_days))
            .collect();

        if !elasticities.is_empty() {
            let mean_magnitude =
                elasticities.iter().map(|e| e.abs()).sum::<f64>() / elasticities.len() as f64;
            return bounded(mean_magnitude / (1.0 + mean_magnitude));
        }

        let window = self.sales_window(cutoff);
        let mut series: Vec<&SalesRecord> =
            sales.iter().filter(|sale| window.contains(sale.sold_on)).collect();
        series.sort_by_key(|sale| sale.sold_on);
        correlation_score(&series)
    }

    /// Recent half of the sales window against the half before it. Declining
    /// sales push the score up, rising sales push it down.
    pub fn sales_trend_score(&self, sales: &[SalesRecord], cutoff: NaiveDate) -> f64 {
        let half = (self.windows.sales_window_days / 2).max(1);
        let recent = DateWindow::trailing(cutoff, half);
        let earlier = DateWindow::trailing(recent.start, half);

        let recent_units = units_in(sales, recent) as f64;
        let earlier_units = units_in(sales, earlier) as f64;

        let change = if earlier_units == 0.0 {
            if recent_units == 0.0 {
                return NEUTRAL_SCORE;
            }
            1.0
        } else {
            (recent_units - earlier_units) / earlier_units
        };

        bounded(0.5 - 0.5 * change.tanh())
    }

    /// Recency-weighted count of promotions inside the look-back period.
    /// Each promotion counts `0.5^(age / half_life)` where age is measured
    /// from its end; a running promotion counts fully.
    pub fn promotion_fatigue_score(&self, promotions: &[PromotionRecord], cutoff: NaiveDate) -> f64 {
        let lookback = DateWindow::trailing(cutoff, self.windows.promotion_lookback_days);
        let half_life = f64::from(self.windows.fatigue_half_life_days.max(1));

        let pressure: f64 = promotions
            .iter()
            .filter(|promo| promo.duration_days() > 0)
            .filter(|promo| lookback.overlaps(promo.starts_on, promo.ends_on))
            .map(|promo| {
                let age = (cutoff - promo.ends_on).num_days().max(0) as f64;
                0.5f64.powf(age / half_life)
            })
            .sum();

        bounded(1.0 - (-pressure).exp())
    }
}

/// `total_sold / total_injected` over `window`; `None` when nothing was injected.
pub fn rotation_rate(
    sales: &[SalesRecord],
    injections: &[InjectionRecord],
    window: DateWindow,
) -> Option<f64> {
    let injected = injected_in(injections, window);
    if injected == 0 {
        return None;
    }
    Some(units_in(sales, window) as f64 / injected as f64)
}

/// Decreasing map of the rotation rate: slow movers (`< 0.5`) land in
/// `(0.6, 1.0]`, well-sold stock (`>= 1.0`) in `(0.0, 0.2]`.
pub fn rotation_score(rate: Option<f64>) -> f64 {
    let Some(rate) = rate.filter(|rate| rate.is_finite()) else {
        return NEUTRAL_SCORE;
    };
    let rate = rate.max(0.0);
    let score = if rate < 0.5 {
        1.0 - 0.8 * rate
    } else if rate < 1.0 {
        0.6 - 0.8 * (rate - 0.5)
    } else {
        0.2 / rate
    };
    bounded(score)
}

/// Point elasticity of one promotion: relative change of daily units sold
/// (promotion window against the `baseline_days` before it) divided by the
/// relative price change. A discount that lifts sales is negative.
pub fn promotion_elasticity(
    promo: &PromotionRecord,
    sales: &[SalesRecord],
    baseline_days: u32,
) -> Option<f64> {
    let duration = promo.duration_days();
    if duration <= 0 || baseline_days == 0 {
        return None;
    }

    let price_change = promo.price_change_ratio().filter(|change| *change != 0.0)?;

    let baseline = DateWindow::trailing(promo.starts_on, baseline_days);
    let baseline_rate = units_in(sales, baseline) as f64 / f64::from(baseline_days);
    if baseline_rate <= 0.0 {
        return None;
    }

    let promo_rate = promo.units_sold(sales) as f64 / duration as f64;
    let volume_change = (promo_rate - baseline_rate) / baseline_rate;
    let elasticity = volume_change / price_change;
    elasticity.is_finite().then_some(elasticity)
}

/// Realized outcome of a promotion against its pre-promotion baseline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub sales_lift: f64,
    pub revenue_change: f64,
}

/// Sales lift and revenue change of `promo`; `None` without a baseline.
pub fn promotion_outcome(
    promo: &PromotionRecord,
    sales: &[SalesRecord],
    baseline_days: u32,
) -> Option<PromotionOutcome> {
    let duration = promo.duration_days();
    if duration <= 0 || baseline_days == 0 {
        return None;
    }

    let baseline = DateWindow::trailing(promo.starts_on, baseline_days);
    let baseline_units = units_in(sales, baseline) as f64 / f64::from(baseline_days);
    if baseline_units <= 0.0 {
        return None;
    }
    let baseline_revenue = revenue_in(sales, baseline) / f64::from(baseline_days);

    let price_after = promo.price_after.to_f64().unwrap_or(0.0);
    let promo_units = promo.units_sold(sales) as f64 / duration as f64;
    let promo_revenue = promo_units * price_after;

    let sales_lift = promo_units / baseline_units - 1.0;
    let revenue_change =
        if baseline_revenue > 0.0 { promo_revenue / baseline_revenue - 1.0 } else { 0.0 };

    Some(PromotionOutcome { sales_lift, revenue_change })
}

fn correlation_score(series: &[&SalesRecord]) -> f64 {
    if series.len() < MIN_CORRELATION_RECORDS {
        return NEUTRAL_SCORE;
    }

    let mut price_changes = Vec::with_capacity(series.len());
    let mut quantity_changes = Vec::with_capacity(series.len());
    for pair in series.windows(2) {
        let previous_price = pair[0].unit_price.to_f64().unwrap_or(0.0);
        let price = pair[1].unit_price.to_f64().unwrap_or(0.0);
        let previous_quantity = f64::from(pair[0].quantity);
        if previous_price <= 0.0 || previous_quantity <= 0.0 {
            continue;
        }
        price_changes.push((price - previous_price) / previous_price);
        quantity_changes.push((f64::from(pair[1].quantity) - previous_quantity) / previous_quantity);
    }

    if price_changes.len() < MIN_CORRELATION_PAIRS {
        return NEUTRAL_SCORE;
    }

    match pearson(&price_changes, &quantity_changes) {
        Some(correlation) => ((1.0 - correlation) / 2.0).clamp(0.1, 0.9),
        None => NEUTRAL_SCORE,
    }
}

/// Pearson correlation; `None` when either series has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x <= f64::EPSILON || variance_y <= f64::EPSILON {
        return None;
    }
    let correlation = covariance / (variance_x.sqrt() * variance_y.sqrt());
    correlation.is_finite().then_some(correlation.clamp(-1.0, 1.0))
}

/// Earliest date whose sales are needed to extract features at `cutoff`.
pub fn earliest_sales_date(
    windows: &FeatureWindows,
    promotions: &[PromotionRecord],
    cutoff: NaiveDate,
) -> NaiveDate {
    let sales_start = DateWindow::trailing(cutoff, windows.sales_window_days).start;
    promotions
        .iter()
        .map(|promo| promo.starts_on - Duration::days(i64::from(windows.baseline_days)))
        .fold(sales_start, |earliest, date| earliest.min(date))
}

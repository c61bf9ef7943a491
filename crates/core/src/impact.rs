//! Impact estimation
//!
//! Projects sales volume and revenue over a fixed horizon for a chosen
//! discount. The elasticity score scales how strongly volume reacts to the
//! discount depth. Revenue change is reported as is and may be negative.

use serde::{Deserialize, Serialize};

/// Volume multiplier per unit of elasticity score. A neutral score gives the
/// `2x` lift per discount fraction used by the historical rule of thumb.
pub const SENSITIVITY_PER_SCORE: f64 = 4.0;

/// Daily volume assumed for articles without sales history.
pub const DEFAULT_DAILY_SALES: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactInputs {
    pub promotion_pct: u32,
    pub current_price: f64,
    pub discounted_price: f64,
    pub current_stock: i64,
    pub elasticity_score: f64,
    /// Average units per day over the sales window, if any sales exist.
    pub baseline_daily_sales: Option<f64>,
    /// Average revenue per day over the sales window, if any sales exist.
    pub baseline_daily_revenue: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub horizon_days: u32,
    pub current_sales_volume: f64,
    pub projected_sales_volume: f64,
    pub sales_volume_change: f64,
    pub sales_volume_change_pct: f64,
    pub current_revenue: f64,
    pub projected_revenue: f64,
    pub revenue_change: f64,
    pub revenue_change_pct: f64,
    /// Projected volume was capped at the units currently in stock.
    pub stock_constrained: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactEstimator {
    horizon_days: u32,
}

impl Default for ImpactEstimator {
    fn default() -> Self {
        Self { horizon_days: 30 }
    }
}

impl ImpactEstimator {
    pub fn new(horizon_days: u32) -> Self {
        Self { horizon_days: horizon_days.max(1) }
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    pub fn estimate(&self, inputs: &ImpactInputs) -> ImpactEstimate {
        let horizon = f64::from(self.horizon_days);
        let daily_sales = inputs
            .baseline_daily_sales
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .unwrap_or(DEFAULT_DAILY_SALES);
        let daily_revenue = inputs
            .baseline_daily_revenue
            .filter(|revenue| revenue.is_finite() && *revenue >= 0.0)
            .unwrap_or(daily_sales * inputs.current_price);

        let sensitivity = SENSITIVITY_PER_SCORE * inputs.elasticity_score.clamp(0.0, 1.0);
        let lift = 1.0 + f64::from(inputs.promotion_pct) / 100.0 * sensitivity;

        let current_volume = daily_sales * horizon;
        let mut projected_volume = current_volume * lift;
        let mut stock_constrained = false;
        if inputs.current_stock > 0 && (inputs.current_stock as f64) < projected_volume {
            projected_volume = inputs.current_stock as f64;
            stock_constrained = true;
        }

        let current_revenue = daily_revenue * horizon;
        let projected_revenue = projected_volume * inputs.discounted_price;

        ImpactEstimate {
            horizon_days: self.horizon_days,
            current_sales_volume: round2(current_volume),
            projected_sales_volume: round2(projected_volume),
            sales_volume_change: round2(projected_volume - current_volume),
            sales_volume_change_pct: round2(percent_change(current_volume, projected_volume)),
            current_revenue: round2(current_revenue),
            projected_revenue: round2(projected_revenue),
            revenue_change: round2(projected_revenue - current_revenue),
            revenue_change_pct: round2(percent_change(current_revenue, projected_revenue)),
            stock_constrained,
        }
    }
}

fn percent_change(current: f64, projected: f64) -> f64 {
    if current > 0.0 {
        (projected - current) / current * 100.0
    } else {
        0.0
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stock levels that override the revenue-based recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockThresholds {
    pub stock_critical: i64,
    pub stock_excess: i64,
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self { stock_critical: 10, stock_excess: 100 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StockCritical,
    Overstock,
    Profitable,
    RevenueRisk,
    Neutral,
}

impl Recommendation {
    pub fn classify(current_stock: i64, thresholds: &StockThresholds, impact: &ImpactEstimate) -> Self {
        if current_stock <= thresholds.stock_critical {
            Self::StockCritical
        } else if current_stock >= thresholds.stock_excess {
            Self::Overstock
        } else if impact.revenue_change_pct > 0.0 && impact.sales_volume_change_pct > 20.0 {
            Self::Profitable
        } else if impact.revenue_change_pct < -10.0 {
            Self::RevenueRisk
        } else {
            Self::Neutral
        }
    }

    pub fn message(&self, promotion_pct: u32, impact: &ImpactEstimate) -> String {
        match self {
            Self::StockCritical => format!(
                "Critical stock: avoid the {promotion_pct}% promotion to prevent a stock-out"
            ),
            Self::Overstock => {
                format!("Overstock: a {promotion_pct}% promotion is recommended to clear stock")
            }
            Self::Profitable => format!(
                "Profitable promotion: revenue {:+.1}% and sales volume {:+.1}% expected",
                impact.revenue_change_pct, impact.sales_volume_change_pct
            ),
            Self::RevenueRisk => format!(
                "Revenue risk: the promotion could reduce revenue by {:.1}%",
                impact.revenue_change_pct.abs()
            ),
            Self::Neutral => {
                format!("Neutral: moderate impact expected, a {promotion_pct}% promotion is acceptable")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn assess(current_stock: i64, promotion_pct: u32, impact: &ImpactEstimate) -> Self {
        if impact.revenue_change_pct < -15.0 || current_stock < 5 {
            Self::High
        } else if impact.revenue_change_pct < 5.0 || promotion_pct > 35 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

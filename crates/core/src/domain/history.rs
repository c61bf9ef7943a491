use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::article::ArticleId;

/// Half-open day range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days immediately before `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        Self { start: end - Duration::days(i64::from(days)), end }
    }

    /// Everything recorded before `end`.
    pub fn history_until(end: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start < self.end && end > self.start
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub article_id: ArticleId,
    pub sold_on: NaiveDate,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl SalesRecord {
    pub fn revenue(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price.to_f64().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionRecord {
    pub article_id: ArticleId,
    pub injected_on: NaiveDate,
    pub quantity: u32,
}

/// A historical promotion. The promotion runs over `[starts_on, ends_on)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub id: String,
    pub article_id: ArticleId,
    pub discount_pct: f64,
    pub price_before: Decimal,
    pub price_after: Decimal,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    /// Units sold during the promotion, when the source recorded it.
    pub sales_during: Option<u32>,
}

impl PromotionRecord {
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.starts_on, self.ends_on)
    }

    pub fn duration_days(&self) -> i64 {
        (self.ends_on - self.starts_on).num_days()
    }

    /// Relative price change `(after - before) / before`; negative for a discount.
    pub fn price_change_ratio(&self) -> Option<f64> {
        let before = self.price_before.to_f64()?;
        let after = self.price_after.to_f64()?;
        if before <= 0.0 || after < 0.0 {
            return None;
        }
        Some((after - before) / before)
    }

    /// Units sold in the promotion window, preferring the recorded figure.
    pub fn units_sold(&self, sales: &[SalesRecord]) -> u64 {
        match self.sales_during {
            Some(units) => u64::from(units),
            None => units_in(sales, self.window()),
        }
    }
}

pub fn units_in(sales: &[SalesRecord], window: DateWindow) -> u64 {
    sales
        .iter()
        .filter(|sale| window.contains(sale.sold_on))
        .map(|sale| u64::from(sale.quantity))
        .sum()
}

pub fn revenue_in(sales: &[SalesRecord], window: DateWindow) -> f64 {
    sales.iter().filter(|sale| window.contains(sale.sold_on)).map(SalesRecord::revenue).sum()
}

pub fn injected_in(injections: &[InjectionRecord], window: DateWindow) -> u64 {
    injections
        .iter()
        .filter(|injection| window.contains(injection.injected_on))
        .map(|injection| u64::from(injection.quantity))
        .sum()
}

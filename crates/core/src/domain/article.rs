use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleId(pub String);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// One product as seen by a single analysis run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSnapshot {
    pub id: ArticleId,
    pub name: String,
    pub category_id: CategoryId,
    pub current_stock: i64,
    pub min_stock_threshold: i64,
    pub price: Decimal,
}

impl ArticleSnapshot {
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    /// Sale price after applying `promotion_pct`, rounded to cents.
    pub fn discounted_price(&self, promotion_pct: u32) -> Decimal {
        let keep = Decimal::from(100u32.saturating_sub(promotion_pct));
        (self.price * keep / Decimal::ONE_HUNDRED).round_dp(2)
    }
}

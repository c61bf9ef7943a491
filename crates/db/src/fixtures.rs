//! Deterministic demo category.
//!
//! Three articles covering the shapes the engine has to handle:
//! 1. a kettle that was never restocked inside the window (zero injections)
//!    but has a promotion history
//! 2. a blender with a full monthly promotion history
//! 3. a toaster with no promotions and a price that alternates month to month

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use promolift_core::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
use promolift_core::domain::history::{
    units_in, InjectionRecord, PromotionRecord, SalesRecord,
};

use crate::connection::DbPool;
use crate::repositories::{InMemoryPromotionDataProvider, RepositoryError, SqlPromotionDataProvider};

pub const DEMO_CATEGORY_ID: &str = "CAT-KITCHEN";
pub const ZERO_INJECTION_ARTICLE: &str = "ART-KETTLE";
pub const PROMOTED_ARTICLE: &str = "ART-BLENDER";
pub const UNPROMOTED_ARTICLE: &str = "ART-TOASTER";

const HISTORY_DAYS: i64 = 400;

#[derive(Clone, Debug, PartialEq)]
pub struct DemoDataset {
    pub as_of: NaiveDate,
    pub category: Category,
    pub articles: Vec<ArticleSnapshot>,
    pub sales: Vec<SalesRecord>,
    pub injections: Vec<InjectionRecord>,
    pub promotions: Vec<PromotionRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedResult {
    pub category_id: CategoryId,
    pub as_of: NaiveDate,
    pub articles: usize,
    pub sales: usize,
    pub injections: usize,
    pub promotions: usize,
    pub trainable_promotions: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl Default for DemoDataset {
    fn default() -> Self {
        Self::build(default_as_of())
    }
}

fn default_as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap_or(NaiveDate::MIN)
}

impl DemoDataset {
    pub fn build(as_of: NaiveDate) -> Self {
        let category =
            Category { id: CategoryId(DEMO_CATEGORY_ID.to_string()), name: "Kitchen & Home".to_string() };
        let article = |id: &str, name: &str, stock: i64, price: Decimal| ArticleSnapshot {
            id: ArticleId(id.to_string()),
            name: name.to_string(),
            category_id: category.id.clone(),
            current_stock: stock,
            min_stock_threshold: 10,
            price,
        };
        let articles = vec![
            article(PROMOTED_ARTICLE, "Countertop Blender", 120, Decimal::new(8900, 2)),
            article(ZERO_INJECTION_ARTICLE, "Electric Kettle", 35, Decimal::new(3990, 2)),
            article(UNPROMOTED_ARTICLE, "Two-Slot Toaster", 8, Decimal::new(4990, 2)),
        ];

        let first_day = as_of - Duration::days(HISTORY_DAYS);
        let mut promotions = Vec::new();
        for k in 0..12i64 {
            let starts_on = as_of - Duration::days(360 - 30 * k);
            let pct = 15 + 5 * (k % 5);
            promotions.push(promotion(&articles[0], &format!("PROMO-BL-{:02}", k + 1), pct, starts_on, 7));
        }
        promotions.push(promotion(&articles[0], "PROMO-BL-FLASH", 20, as_of - Duration::days(5), 0));
        for k in 0..10i64 {
            let starts_on = as_of - Duration::days(350 - 35 * k);
            let pct = 10 + 5 * (k % 4);
            promotions.push(promotion(&articles[1], &format!("PROMO-KT-{:02}", k + 1), pct, starts_on, 5));
        }
        promotions.push(promotion(&articles[1], "PROMO-KT-LIVE", 15, as_of - Duration::days(3), 7));

        let mut sales = Vec::new();
        let mut injections = Vec::new();
        for offset in 0..=HISTORY_DAYS {
            let day = first_day + Duration::days(offset);
            if offset % 2 == 0 {
                let base = 3 + u32::try_from((offset * 7) % 5).unwrap_or(0);
                for article in &articles {
                    sales.push(daily_sale(article, day, offset, base, &promotions));
                }
            }
            if offset % 30 == 0 {
                for article in articles.iter().filter(|a| a.id.0 != ZERO_INJECTION_ARTICLE) {
                    injections.push(InjectionRecord {
                        article_id: article.id.clone(),
                        injected_on: day,
                        quantity: 60,
                    });
                }
            }
        }

        // blender promotions alternate between a recorded and a derived outcome
        for (index, promo) in promotions
            .iter_mut()
            .filter(|p| p.article_id.0 == PROMOTED_ARTICLE && p.duration_days() > 0)
            .enumerate()
        {
            if index % 2 == 0 {
                let units = units_in(&sales, promo.window());
                promo.sales_during = u32::try_from(units).ok();
            }
        }

        Self { as_of, category, articles, sales, injections, promotions }
    }

    /// Promotions that ended by `as_of` with a positive duration.
    pub fn trainable_promotions(&self) -> usize {
        self.promotions
            .iter()
            .filter(|p| p.duration_days() > 0 && p.ends_on <= self.as_of + Duration::days(1))
            .count()
    }

    pub fn article_ids(&self) -> Vec<ArticleId> {
        self.articles.iter().map(|a| a.id.clone()).collect()
    }

    /// Write the dataset through the SQL provider. Re-seeding replaces the
    /// demo rows instead of duplicating them.
    pub async fn seed(&self, pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        Self::clean(pool, &self.article_ids()).await?;

        let provider = SqlPromotionDataProvider::new(pool.clone());
        provider.save_category(&self.category).await?;
        for article in &self.articles {
            provider.save_article(article).await?;
        }
        provider.insert_sales(&self.sales).await?;
        provider.insert_injections(&self.injections).await?;
        for promo in &self.promotions {
            provider.save_promotion(promo).await?;
        }

        Ok(self.seed_summary())
    }

    pub async fn load_into(&self, provider: &InMemoryPromotionDataProvider) -> SeedResult {
        provider.save_category(self.category.clone()).await;
        for article in &self.articles {
            provider.save_article(article.clone()).await;
        }
        provider.insert_sales(self.sales.iter().cloned()).await;
        provider.insert_injections(self.injections.iter().cloned()).await;
        for promo in &self.promotions {
            provider.save_promotion(promo.clone()).await;
        }
        self.seed_summary()
    }

    pub async fn in_memory(&self) -> InMemoryPromotionDataProvider {
        let provider = InMemoryPromotionDataProvider::default();
        self.load_into(&provider).await;
        provider
    }

    /// Verify that the seeded rows match the dataset.
    pub async fn verify(&self, pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let category_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM category WHERE id = ?1)")
                .bind(&self.category.id.0)
                .fetch_one(pool)
                .await?;
        checks.push(("category".to_string(), category_exists == 1));

        let article_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM article WHERE category_id = ?1")
                .bind(&self.category.id.0)
                .fetch_one(pool)
                .await?;
        checks.push(("article-count".to_string(), article_count == count(self.articles.len())));

        for article in &self.articles {
            let expected_sales =
                self.sales.iter().filter(|s| s.article_id == article.id).count();
            let sale_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM sale WHERE article_id = ?1")
                    .bind(&article.id.0)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}-sales", article.id), sale_count == count(expected_sales)));

            let expected_injections =
                self.injections.iter().filter(|i| i.article_id == article.id).count();
            let injection_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM stock_injection WHERE article_id = ?1")
                    .bind(&article.id.0)
                    .fetch_one(pool)
                    .await?;
            checks.push((
                format!("{}-injections", article.id),
                injection_count == count(expected_injections),
            ));

            let expected_promotions =
                self.promotions.iter().filter(|p| p.article_id == article.id).count();
            let promotion_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM promotion WHERE article_id = ?1")
                    .bind(&article.id.0)
                    .fetch_one(pool)
                    .await?;
            checks.push((
                format!("{}-promotions", article.id),
                promotion_count == count(expected_promotions),
            ));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the history rows of `article_ids`. Categories, articles and
    /// promotions are upserted on seed and need no cleanup.
    pub async fn clean(pool: &DbPool, article_ids: &[ArticleId]) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for id in article_ids {
            sqlx::query("DELETE FROM sale WHERE article_id = ?").bind(&id.0).execute(&mut *tx).await?;
            sqlx::query("DELETE FROM stock_injection WHERE article_id = ?")
                .bind(&id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub fn seed_summary(&self) -> SeedResult {
        SeedResult {
            category_id: self.category.id.clone(),
            as_of: self.as_of,
            articles: self.articles.len(),
            sales: self.sales.len(),
            injections: self.injections.len(),
            promotions: self.promotions.len(),
            trainable_promotions: self.trainable_promotions(),
        }
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn promotion(
    article: &ArticleSnapshot,
    id: &str,
    pct: i64,
    starts_on: NaiveDate,
    days: i64,
) -> PromotionRecord {
    let keep = Decimal::from(100 - pct);
    PromotionRecord {
        id: id.to_string(),
        article_id: article.id.clone(),
        discount_pct: pct as f64,
        price_before: article.price,
        price_after: (article.price * keep / Decimal::ONE_HUNDRED).round_dp(2),
        starts_on,
        ends_on: starts_on + Duration::days(days),
        sales_during: None,
    }
}

/// One sale row. Promotions lift volume in proportion to their depth; the
/// toaster trades a 10% cheaper price every other month for extra volume.
fn daily_sale(
    article: &ArticleSnapshot,
    day: NaiveDate,
    offset: i64,
    base: u32,
    promotions: &[PromotionRecord],
) -> SalesRecord {
    let running = promotions
        .iter()
        .find(|p| p.article_id == article.id && p.duration_days() > 0 && p.window().contains(day));

    let (quantity, unit_price) = match running {
        Some(promo) => {
            let responsiveness = if article.id.0 == PROMOTED_ARTICLE { 3.0 } else { 2.0 };
            let lift = 1.0 + promo.discount_pct / 100.0 * responsiveness;
            let quantity = (f64::from(base) * lift).round().to_u32().unwrap_or(base);
            (quantity, promo.price_after)
        }
        None if article.id.0 == UNPROMOTED_ARTICLE && (offset / 30) % 2 == 1 => {
            (base + 2, (article.price * Decimal::new(9, 1)).round_dp(2))
        }
        None => (base, article.price),
    };

    SalesRecord { article_id: article.id.clone(), sold_on: day, quantity, unit_price }
}

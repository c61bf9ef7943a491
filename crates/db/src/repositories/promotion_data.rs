use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use promolift_core::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
use promolift_core::domain::history::{
    DateWindow, InjectionRecord, PromotionRecord, SalesRecord,
};
use promolift_core::provider::{
    CategoryArticles, MalformedArticle, PromotionDataProvider, ProviderError,
};

use super::{decode_err, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Read side of the store of record, plus the inserts used by seeding.
#[derive(Clone)]
pub struct SqlPromotionDataProvider {
    pool: DbPool,
}

impl SqlPromotionDataProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn save_category(&self, category: &Category) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO category (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(&category.id.0)
        .bind(&category.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_article(&self, article: &ArticleSnapshot) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO article (id, category_id, name, current_stock, min_stock_threshold, price)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 category_id = excluded.category_id,
                 name = excluded.name,
                 current_stock = excluded.current_stock,
                 min_stock_threshold = excluded.min_stock_threshold,
                 price = excluded.price",
        )
        .bind(&article.id.0)
        .bind(&article.category_id.0)
        .bind(&article.name)
        .bind(article.current_stock)
        .bind(article.min_stock_threshold)
        .bind(article.price.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_sales(&self, sales: &[SalesRecord]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for sale in sales {
            sqlx::query(
                "INSERT INTO sale (article_id, sold_on, quantity, unit_price) VALUES (?, ?, ?, ?)",
            )
            .bind(&sale.article_id.0)
            .bind(format_date(sale.sold_on))
            .bind(i64::from(sale.quantity))
            .bind(sale.unit_price.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_injections(
        &self,
        injections: &[InjectionRecord],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for injection in injections {
            sqlx::query(
                "INSERT INTO stock_injection (article_id, injected_on, quantity) VALUES (?, ?, ?)",
            )
            .bind(&injection.article_id.0)
            .bind(format_date(injection.injected_on))
            .bind(i64::from(injection.quantity))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn save_promotion(&self, promo: &PromotionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO promotion (id, article_id, discount_pct, price_before, price_after,
                                    starts_on, ends_on, sales_during)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 discount_pct = excluded.discount_pct,
                 price_before = excluded.price_before,
                 price_after = excluded.price_after,
                 starts_on = excluded.starts_on,
                 ends_on = excluded.ends_on,
                 sales_during = excluded.sales_during",
        )
        .bind(&promo.id)
        .bind(&promo.article_id.0)
        .bind(promo.discount_pct)
        .bind(promo.price_before.to_string())
        .bind(promo.price_after.to_string())
        .bind(format_date(promo.starts_on))
        .bind(format_date(promo.ends_on))
        .bind(promo.sales_during.map(i64::from))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("invalid date `{raw}`: {e}")))
}

fn parse_decimal(raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| RepositoryError::Decode(format!("invalid decimal `{raw}`: {e}")))
}

fn parse_quantity(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}

fn row_to_category(row: &SqliteRow) -> Result<Category, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    Ok(Category { id: CategoryId(id), name })
}

fn row_to_article(row: &SqliteRow) -> Result<ArticleSnapshot, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let category_id: String = row.try_get("category_id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    let current_stock: i64 = row.try_get("current_stock").map_err(decode_err)?;
    let min_stock_threshold: i64 = row.try_get("min_stock_threshold").map_err(decode_err)?;
    let price: String = row.try_get("price").map_err(decode_err)?;

    Ok(ArticleSnapshot {
        id: ArticleId(id),
        name,
        category_id: CategoryId(category_id),
        current_stock,
        min_stock_threshold,
        price: parse_decimal(&price)?,
    })
}

fn row_to_sale(row: &SqliteRow) -> Result<SalesRecord, RepositoryError> {
    let article_id: String = row.try_get("article_id").map_err(decode_err)?;
    let sold_on: String = row.try_get("sold_on").map_err(decode_err)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_err)?;
    let unit_price: String = row.try_get("unit_price").map_err(decode_err)?;

    Ok(SalesRecord {
        article_id: ArticleId(article_id),
        sold_on: parse_date(&sold_on)?,
        quantity: parse_quantity(quantity, "sale.quantity")?,
        unit_price: parse_decimal(&unit_price)?,
    })
}

fn row_to_injection(row: &SqliteRow) -> Result<InjectionRecord, RepositoryError> {
    let article_id: String = row.try_get("article_id").map_err(decode_err)?;
    let injected_on: String = row.try_get("injected_on").map_err(decode_err)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_err)?;

    Ok(InjectionRecord {
        article_id: ArticleId(article_id),
        injected_on: parse_date(&injected_on)?,
        quantity: parse_quantity(quantity, "stock_injection.quantity")?,
    })
}

fn row_to_promotion(row: &SqliteRow) -> Result<PromotionRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let article_id: String = row.try_get("article_id").map_err(decode_err)?;
    let discount_pct: f64 = row.try_get("discount_pct").map_err(decode_err)?;
    let price_before: String = row.try_get("price_before").map_err(decode_err)?;
    let price_after: String = row.try_get("price_after").map_err(decode_err)?;
    let starts_on: String = row.try_get("starts_on").map_err(decode_err)?;
    let ends_on: String = row.try_get("ends_on").map_err(decode_err)?;
    let sales_during: Option<i64> = row.try_get("sales_during").map_err(decode_err)?;

    Ok(PromotionRecord {
        id,
        article_id: ArticleId(article_id),
        discount_pct,
        price_before: parse_decimal(&price_before)?,
        price_after: parse_decimal(&price_after)?,
        starts_on: parse_date(&starts_on)?,
        ends_on: parse_date(&ends_on)?,
        sales_during: sales_during
            .map(|value| parse_quantity(value, "promotion.sales_during"))
            .transpose()?,
    })
}

fn collect<T>(
    rows: &[SqliteRow],
    decode: fn(&SqliteRow) -> Result<T, RepositoryError>,
) -> Result<Vec<T>, ProviderError> {
    rows.iter().map(decode).collect::<Result<Vec<_>, _>>().map_err(ProviderError::from)
}

#[async_trait]
impl PromotionDataProvider for SqlPromotionDataProvider {
    async fn categories(&self) -> Result<Vec<Category>, ProviderError> {
        let rows = sqlx::query("SELECT id, name FROM category ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        collect(&rows, row_to_category)
    }

    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, ProviderError> {
        let row = sqlx::query("SELECT id, name FROM category WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_category(r)?)),
            None => Ok(None),
        }
    }

    async fn articles_in_category(
        &self,
        id: &CategoryId,
    ) -> Result<CategoryArticles, ProviderError> {
        let rows = sqlx::query(
            "SELECT id, category_id, name, current_stock, min_stock_threshold, price
             FROM article WHERE category_id = ? ORDER BY id",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        // rows are decoded one at a time so a corrupt row only costs itself
        let mut listed = CategoryArticles::default();
        for row in &rows {
            match row_to_article(row) {
                Ok(article) => listed.articles.push(article),
                Err(error) => {
                    let article_id: String = row.try_get("id").map_err(decode_err)?;
                    listed.malformed.push(MalformedArticle {
                        article_id: ArticleId(article_id),
                        message: error.to_string(),
                    });
                }
            }
        }
        Ok(listed)
    }

    async fn article(&self, id: &ArticleId) -> Result<Option<ArticleSnapshot>, ProviderError> {
        let row = sqlx::query(
            "SELECT id, category_id, name, current_stock, min_stock_threshold, price
             FROM article WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_article(r)?)),
            None => Ok(None),
        }
    }

    async fn sales(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<SalesRecord>, ProviderError> {
        let rows = sqlx::query(
            "SELECT article_id, sold_on, quantity, unit_price
             FROM sale
             WHERE article_id = ? AND sold_on >= ? AND sold_on < ?
             ORDER BY sold_on, id",
        )
        .bind(&article.0)
        .bind(format_date(window.start))
        .bind(format_date(window.end))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        collect(&rows, row_to_sale)
    }

    async fn injections(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<InjectionRecord>, ProviderError> {
        let rows = sqlx::query(
            "SELECT article_id, injected_on, quantity
             FROM stock_injection
             WHERE article_id = ? AND injected_on >= ? AND injected_on < ?
             ORDER BY injected_on, id",
        )
        .bind(&article.0)
        .bind(format_date(window.start))
        .bind(format_date(window.end))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        collect(&rows, row_to_injection)
    }

    async fn promotions(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<PromotionRecord>, ProviderError> {
        let rows = sqlx::query(
            "SELECT id, article_id, discount_pct, price_before, price_after,
                    starts_on, ends_on, sales_during
             FROM promotion
             WHERE article_id = ? AND starts_on < ? AND ends_on > ?
             ORDER BY starts_on, id",
        )
        .bind(&article.0)
        .bind(format_date(window.end))
        .bind(format_date(window.start))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        collect(&rows, row_to_promotion)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use promolift_core::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
    use promolift_core::domain::history::{DateWindow, PromotionRecord, SalesRecord};
    use promolift_core::provider::{PromotionDataProvider, ProviderError};

    use super::SqlPromotionDataProvider;
    use crate::{connect_with_settings, migrations};

    fn day(month: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, d).expect("valid date")
    }

    async fn provider() -> SqlPromotionDataProvider {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let provider = SqlPromotionDataProvider::new(pool);

        provider
            .save_category(&Category { id: CategoryId("C-1".into()), name: "Kitchen".into() })
            .await
            .expect("category");
        provider
            .save_article(&ArticleSnapshot {
                id: ArticleId("A-1".into()),
                name: "Kettle".into(),
                category_id: CategoryId("C-1".into()),
                current_stock: 42,
                min_stock_threshold: 5,
                price: Decimal::new(2999, 2),
            })
            .await
            .expect("article");
        provider
    }

    #[tokio::test]
    async fn article_round_trip_keeps_decimal_price() {
        let provider = provider().await;
        let article = provider.article(&ArticleId("A-1".into())).await.expect("query").expect("row");

        assert_eq!(article.price, Decimal::new(2999, 2));
        assert_eq!(article.current_stock, 42);
        assert!(provider.article(&ArticleId("missing".into())).await.expect("query").is_none());

        let listed =
            provider.articles_in_category(&CategoryId("C-1".into())).await.expect("query");
        assert_eq!(listed.articles, vec![article]);
        assert!(listed.malformed.is_empty());
        let empty = provider
            .articles_in_category(&CategoryId("C-9".into()))
            .await
            .expect("empty, not an error");
        assert!(empty.articles.is_empty() && empty.malformed.is_empty());
    }

    #[tokio::test]
    async fn sales_window_is_half_open() {
        let provider = provider().await;
        let sales: Vec<SalesRecord> = [1, 10, 20]
            .iter()
            .map(|d| SalesRecord {
                article_id: ArticleId("A-1".into()),
                sold_on: day(3, *d),
                quantity: 2,
                unit_price: Decimal::new(2999, 2),
            })
            .collect();
        provider.insert_sales(&sales).await.expect("insert");

        let found = provider
            .sales(&ArticleId("A-1".into()), DateWindow::new(day(3, 1), day(3, 20)))
            .await
            .expect("query");
        assert_eq!(found, sales[..2].to_vec());
    }

    #[tokio::test]
    async fn promotions_overlapping_the_window_are_returned() {
        let provider = provider().await;
        let promo = |id: &str, start: NaiveDate, end: NaiveDate| PromotionRecord {
            id: id.to_string(),
            article_id: ArticleId("A-1".into()),
            discount_pct: 15.0,
            price_before: Decimal::new(10000, 2),
            price_after: Decimal::new(8500, 2),
            starts_on: start,
            ends_on: end,
            sales_during: Some(30),
        };
        provider.save_promotion(&promo("P-1", day(1, 1), day(1, 15))).await.expect("save");
        provider.save_promotion(&promo("P-2", day(2, 25), day(3, 5))).await.expect("save");
        provider.save_promotion(&promo("P-3", day(4, 1), day(4, 10))).await.expect("save");

        let found = provider
            .promotions(&ArticleId("A-1".into()), DateWindow::new(day(3, 1), day(4, 1)))
            .await
            .expect("query");
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P-2"]);
        assert_eq!(found[0].sales_during, Some(30));
    }

    #[tokio::test]
    async fn malformed_price_is_reported_as_malformed() {
        let provider = provider().await;
        sqlx::query("UPDATE article SET price = 'n/a' WHERE id = 'A-1'")
            .execute(provider.pool())
            .await
            .expect("corrupt row");

        let error = provider.article(&ArticleId("A-1".into())).await.expect_err("bad decimal");
        assert!(matches!(error, ProviderError::Malformed(ref m) if m.contains("n/a")));
    }

    #[tokio::test]
    async fn corrupt_article_row_is_listed_next_to_its_siblings() {
        let provider = provider().await;
        provider
            .save_article(&ArticleSnapshot {
                id: ArticleId("A-2".into()),
                name: "Toaster".into(),
                category_id: CategoryId("C-1".into()),
                current_stock: 8,
                min_stock_threshold: 2,
                price: Decimal::new(4500, 2),
            })
            .await
            .expect("article");
        sqlx::query("UPDATE article SET price = 'abc' WHERE id = 'A-1'")
            .execute(provider.pool())
            .await
            .expect("corrupt row");

        let listed =
            provider.articles_in_category(&CategoryId("C-1".into())).await.expect("query");
        let ids: Vec<&str> = listed.articles.iter().map(|a| a.id.0.as_str()).collect();
        assert_eq!(ids, vec!["A-2"]);
        assert_eq!(listed.malformed.len(), 1);
        assert_eq!(listed.malformed[0].article_id, ArticleId("A-1".into()));
        assert!(listed.malformed[0].message.contains("abc"));
    }
}

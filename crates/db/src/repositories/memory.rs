use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use promolift_core::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
use promolift_core::domain::history::{
    DateWindow, InjectionRecord, PromotionRecord, SalesRecord,
};
use promolift_core::ml::store::{ModelStore, StoreError};
use promolift_core::ml::TrainedModel;
use promolift_core::provider::{CategoryArticles, PromotionDataProvider, ProviderError};

/// Provider over owned records, ordered the same way as the SQL provider.
#[derive(Default)]
pub struct InMemoryPromotionDataProvider {
    categories: RwLock<BTreeMap<CategoryId, Category>>,
    articles: RwLock<BTreeMap<ArticleId, ArticleSnapshot>>,
    sales: RwLock<Vec<SalesRecord>>,
    injections: RwLock<Vec<InjectionRecord>>,
    promotions: RwLock<Vec<PromotionRecord>>,
}

impl InMemoryPromotionDataProvider {
    pub async fn save_category(&self, category: Category) {
        self.categories.write().await.insert(category.id.clone(), category);
    }

    pub async fn save_article(&self, article: ArticleSnapshot) {
        self.articles.write().await.insert(article.id.clone(), article);
    }

    pub async fn insert_sales(&self, sales: impl IntoIterator<Item = SalesRecord>) {
        self.sales.write().await.extend(sales);
    }

    pub async fn insert_injections(&self, injections: impl IntoIterator<Item = InjectionRecord>) {
        self.injections.write().await.extend(injections);
    }

    pub async fn save_promotion(&self, promotion: PromotionRecord) {
        let mut promotions = self.promotions.write().await;
        promotions.retain(|existing| existing.id != promotion.id);
        promotions.push(promotion);
    }
}

#[async_trait]
impl PromotionDataProvider for InMemoryPromotionDataProvider {
    async fn categories(&self) -> Result<Vec<Category>, ProviderError> {
        Ok(self.categories.read().await.values().cloned().collect())
    }

    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, ProviderError> {
        Ok(self.categories.read().await.get(id).cloned())
    }

    async fn articles_in_category(
        &self,
        id: &CategoryId,
    ) -> Result<CategoryArticles, ProviderError> {
        let articles = self.articles.read().await;
        Ok(CategoryArticles::valid(
            articles.values().filter(|article| &article.category_id == id).cloned().collect(),
        ))
    }

    async fn article(&self, id: &ArticleId) -> Result<Option<ArticleSnapshot>, ProviderError> {
        Ok(self.articles.read().await.get(id).cloned())
    }

    async fn sales(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<SalesRecord>, ProviderError> {
        let sales = self.sales.read().await;
        let mut found: Vec<SalesRecord> = sales
            .iter()
            .filter(|sale| &sale.article_id == article && window.contains(sale.sold_on))
            .cloned()
            .collect();
        found.sort_by_key(|sale| sale.sold_on);
        Ok(found)
    }

    async fn injections(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<InjectionRecord>, ProviderError> {
        let injections = self.injections.read().await;
        let mut found: Vec<InjectionRecord> = injections
            .iter()
            .filter(|row| &row.article_id == article && window.contains(row.injected_on))
            .cloned()
            .collect();
        found.sort_by_key(|row| row.injected_on);
        Ok(found)
    }

    async fn promotions(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<PromotionRecord>, ProviderError> {
        let promotions = self.promotions.read().await;
        let mut found: Vec<PromotionRecord> = promotions
            .iter()
            .filter(|promo| {
                &promo.article_id == article && window.overlaps(promo.starts_on, promo.ends_on)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.starts_on.cmp(&b.starts_on).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}

/// Keeps every saved model; the last one saved is current.
#[derive(Default)]
pub struct InMemoryModelStore {
    models: RwLock<Vec<TrainedModel>>,
}

impl InMemoryModelStore {
    pub fn with_model(model: TrainedModel) -> Self {
        Self { models: RwLock::new(vec![model]) }
    }

    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn save(&self, model: &TrainedModel) -> Result<String, StoreError> {
        self.models.write().await.push(model.clone());
        Ok(format!("memory:{}", model.id))
    }

    async fn load(&self, location: &str) -> Result<Option<TrainedModel>, StoreError> {
        let id = location.strip_prefix("memory:").unwrap_or(location);
        let models = self.models.read().await;
        Ok(models.iter().find(|model| model.id.to_string() == id).cloned())
    }

    async fn load_current(&self) -> Result<Option<TrainedModel>, StoreError> {
        Ok(self.models.read().await.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use promolift_core::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
    use promolift_core::domain::history::{DateWindow, PromotionRecord};
    use promolift_core::provider::PromotionDataProvider;

    use super::InMemoryPromotionDataProvider;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).expect("valid date")
    }

    #[tokio::test]
    async fn in_memory_provider_filters_by_category_and_window() {
        let provider = InMemoryPromotionDataProvider::default();
        provider
            .save_category(Category { id: CategoryId("C-1".into()), name: "Garden".into() })
            .await;
        for (id, category) in [("A-2", "C-1"), ("A-1", "C-1"), ("B-1", "C-2")] {
            provider
                .save_article(ArticleSnapshot {
                    id: ArticleId(id.into()),
                    name: id.into(),
                    category_id: CategoryId(category.into()),
                    current_stock: 10,
                    min_stock_threshold: 2,
                    price: Decimal::new(500, 2),
                })
                .await;
        }
        provider
            .save_promotion(PromotionRecord {
                id: "P-1".into(),
                article_id: ArticleId("A-1".into()),
                discount_pct: 10.0,
                price_before: Decimal::new(500, 2),
                price_after: Decimal::new(450, 2),
                starts_on: day(1),
                ends_on: day(8),
                sales_during: None,
            })
            .await;

        let listed =
            provider.articles_in_category(&CategoryId("C-1".into())).await.expect("query");
        let ids: Vec<&str> = listed.articles.iter().map(|a| a.id.0.as_str()).collect();
        assert_eq!(ids, vec!["A-1", "A-2"]);

        let overlapping = provider
            .promotions(&ArticleId("A-1".into()), DateWindow::new(day(7), day(20)))
            .await
            .expect("query");
        assert_eq!(overlapping.len(), 1);
        let after = provider
            .promotions(&ArticleId("A-1".into()), DateWindow::new(day(8), day(20)))
            .await
            .expect("query");
        assert!(after.is_empty());
        assert!(provider.category(&CategoryId("C-2".into())).await.expect("query").is_none());
    }
}

//! Data provider boundary
//!
//! Query shapes the engine needs from the store of record. Implementations
//! return empty sequences when no rows match and `Ok(None)` when the requested
//! category or article does not exist.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::article::{ArticleId, ArticleSnapshot, Category, CategoryId};
use crate::domain::history::{DateWindow, InjectionRecord, PromotionRecord, SalesRecord};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// An article row that exists but could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedArticle {
    pub article_id: ArticleId,
    pub message: String,
}

/// Articles of one category. Undecodable rows are listed separately so their
/// siblings can still be scored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoryArticles {
    pub articles: Vec<ArticleSnapshot>,
    pub malformed: Vec<MalformedArticle>,
}

impl CategoryArticles {
    pub fn valid(articles: Vec<ArticleSnapshot>) -> Self {
        Self { articles, malformed: Vec::new() }
    }
}

#[async_trait]
pub trait PromotionDataProvider: Send + Sync {
    async fn categories(&self) -> Result<Vec<Category>, ProviderError>;

    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, ProviderError>;

    async fn articles_in_category(
        &self,
        id: &CategoryId,
    ) -> Result<CategoryArticles, ProviderError>;

    async fn article(&self, id: &ArticleId) -> Result<Option<ArticleSnapshot>, ProviderError>;

    /// Sales dated inside `window`.
    async fn sales(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<SalesRecord>, ProviderError>;

    /// Restocks dated inside `window`.
    async fn injections(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<InjectionRecord>, ProviderError>;

    /// Promotions overlapping `window`.
    async fn promotions(
        &self,
        article: &ArticleId,
        window: DateWindow,
    ) -> Result<Vec<PromotionRecord>, ProviderError>;
}

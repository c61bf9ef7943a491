use chrono::Duration;
use serde_json::Value;

use promolift_core::domain::article::ArticleId;
use promolift_core::domain::history::DateWindow;
use promolift_core::provider::PromotionDataProvider;
use promolift_db::fixtures::{DemoDataset, PROMOTED_ARTICLE, ZERO_INJECTION_ARTICLE};
use promolift_db::{connect_with_settings, migrations, DbPool, SqlPromotionDataProvider};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn migrated_pool() -> SeedContractTestResult<DbPool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    Ok(pool)
}

async fn table_count(pool: &DbPool, table: &str) -> SeedContractTestResult<i64> {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(1) FROM {table}"))
        .fetch_one(pool)
        .await
        .map_err(|e| format!("count {table}: {e}"))
}

#[tokio::test]
async fn seeded_rows_match_the_demo_dataset() -> SeedContractTestResult {
    let pool = migrated_pool().await?;
    let dataset = DemoDataset::default();
    let seeded = dataset.seed(&pool).await.map_err(|e| e.to_string())?;

    require_eq!(seeded.articles, 3);
    require_eq!(seeded.promotions, dataset.promotions.len());
    require_eq!(seeded.trainable_promotions, 22);

    let verification = dataset.verify(&pool).await.map_err(|e| e.to_string())?;
    let failed: Vec<&str> = verification
        .checks
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name.as_str())
        .collect();
    require!(verification.all_present, "failed checks: {failed:?}");
    Ok(())
}

#[tokio::test]
async fn reseeding_replaces_rows_instead_of_duplicating() -> SeedContractTestResult {
    let pool = migrated_pool().await?;
    let dataset = DemoDataset::default();
    dataset.seed(&pool).await.map_err(|e| e.to_string())?;

    let mut first = Vec::new();
    for table in ["category", "article", "sale", "stock_injection", "promotion"] {
        first.push(table_count(&pool, table).await?);
    }

    dataset.seed(&pool).await.map_err(|e| e.to_string())?;
    let mut second = Vec::new();
    for table in ["category", "article", "sale", "stock_injection", "promotion"] {
        second.push(table_count(&pool, table).await?);
    }

    require_eq!(first, second);
    require!(dataset.verify(&pool).await.map_err(|e| e.to_string())?.all_present);
    Ok(())
}

#[tokio::test]
async fn seeded_history_reads_back_through_the_provider() -> SeedContractTestResult {
    let pool = migrated_pool().await?;
    let dataset = DemoDataset::default();
    dataset.seed(&pool).await.map_err(|e| e.to_string())?;
    let provider = SqlPromotionDataProvider::new(pool);

    let window = DateWindow::history_until(dataset.as_of + Duration::days(1));
    let kettle = ArticleId(ZERO_INJECTION_ARTICLE.to_string());
    let injections = provider.injections(&kettle, window).await.map_err(|e| e.to_string())?;
    require!(injections.is_empty(), "kettle is never restocked");

    let blender = ArticleId(PROMOTED_ARTICLE.to_string());
    let promotions = provider.promotions(&blender, window).await.map_err(|e| e.to_string())?;
    let expected: Vec<_> = dataset
        .promotions
        .iter()
        .filter(|p| p.article_id == blender)
        .cloned()
        .collect();
    require_eq!(promotions.len(), expected.len());
    for promo in &promotions {
        require!(expected.contains(promo), "unexpected promotion {}", promo.id);
    }
    let recorded = promotions.iter().filter(|p| p.sales_during.is_some()).count();
    require_eq!(recorded, 6);
    Ok(())
}

#[test]
fn seed_result_serializes_for_command_output() -> SeedContractTestResult {
    let dataset = DemoDataset::default();
    let value: Value = serde_json::to_value(dataset.seed_summary()).map_err(|e| e.to_string())?;

    require_eq!(value.get("category_id").and_then(Value::as_str), Some("CAT-KITCHEN"));
    require_eq!(value.get("as_of").and_then(Value::as_str), Some("2025-06-30"));
    require_eq!(value.get("trainable_promotions").and_then(Value::as_u64), Some(22));
    Ok(())
}

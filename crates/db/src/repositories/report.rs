use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use promolift_core::domain::article::CategoryId;
use promolift_core::report::AnalysisReport;

use super::{decode_err, AnalysisReportRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReportSummary {
    pub run_id: String,
    pub category_id: CategoryId,
    pub as_of: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub article_count: i64,
    pub skipped_count: i64,
    pub model_id: Option<String>,
}

pub struct SqlAnalysisReportRepository {
    pool: DbPool,
}

impl SqlAnalysisReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<StoredReportSummary, RepositoryError> {
    let run_id: String = row.try_get("id").map_err(decode_err)?;
    let category_id: String = row.try_get("category_id").map_err(decode_err)?;
    let as_of: String = row.try_get("as_of").map_err(decode_err)?;
    let generated_at: String = row.try_get("generated_at").map_err(decode_err)?;
    let article_count: i64 = row.try_get("article_count").map_err(decode_err)?;
    let skipped_count: i64 = row.try_get("skipped_count").map_err(decode_err)?;
    let model_id: Option<String> = row.try_get("model_id").map_err(decode_err)?;

    Ok(StoredReportSummary {
        run_id,
        category_id: CategoryId(category_id),
        as_of: NaiveDate::parse_from_str(&as_of, "%Y-%m-%d").map_err(decode_err)?,
        generated_at: DateTime::parse_from_rfc3339(&generated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_err)?,
        article_count,
        skipped_count,
        model_id,
    })
}

#[async_trait]
impl AnalysisReportRepository for SqlAnalysisReportRepository {
    async fn save(&self, report: &AnalysisReport) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(report).map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO analysis_report (id, category_id, as_of, generated_at, article_count,
                                          skipped_count, model_id, payload_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET payload_json = excluded.payload_json",
        )
        .bind(report.run_id.to_string())
        .bind(&report.category_id.0)
        .bind(report.as_of.format("%Y-%m-%d").to_string())
        .bind(report.generated_at.to_rfc3339())
        .bind(i64::try_from(report.results.len()).unwrap_or(i64::MAX))
        .bind(i64::try_from(report.skipped.len()).unwrap_or(i64::MAX))
        .bind(report.model.as_ref().map(|model| model.model_id.to_string()))
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, run_id: &str) -> Result<Option<AnalysisReport>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM analysis_report WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let payload: String = r.try_get("payload_json").map_err(decode_err)?;
                serde_json::from_str(&payload).map(Some).map_err(decode_err)
            }
            None => Ok(None),
        }
    }

    async fn list_for_category(
        &self,
        category_id: &CategoryId,
        limit: u32,
    ) -> Result<Vec<StoredReportSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, category_id, as_of, generated_at, article_count, skipped_count, model_id
             FROM analysis_report
             WHERE category_id = ?
             ORDER BY generated_at DESC
             LIMIT ?",
        )
        .bind(&category_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_summary).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    use promolift_core::domain::article::CategoryId;
    use promolift_core::report::{AnalysisReport, AnalysisSummary};

    use super::SqlAnalysisReportRepository;
    use crate::repositories::AnalysisReportRepository;
    use crate::{connect_with_settings, migrations};

    fn report(offset_secs: i64) -> AnalysisReport {
        AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now() + Duration::seconds(offset_secs),
            as_of: NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date"),
            category_id: CategoryId("C-1".to_string()),
            category_name: "Kitchen".to_string(),
            model: None,
            results: Vec::new(),
            skipped: Vec::new(),
            summary: AnalysisSummary::default(),
        }
    }

    #[tokio::test]
    async fn reports_round_trip_and_list_newest_first() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlAnalysisReportRepository::new(pool);

        let first = report(0);
        let second = report(60);
        repo.save(&first).await.expect("save");
        repo.save(&second).await.expect("save");

        let loaded =
            repo.find_by_id(&first.run_id.to_string()).await.expect("query").expect("present");
        assert_eq!(loaded, first);

        let listed = repo.list_for_category(&CategoryId("C-1".to_string()), 10).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].run_id, second.run_id.to_string());
        assert!(repo.find_by_id("missing").await.expect("query").is_none());
    }
}

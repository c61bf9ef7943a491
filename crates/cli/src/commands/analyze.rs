use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Args;
use serde::Serialize;
use promolift_core::advisor::{AdvisorSettings, PromotionAdvisor};
use promolift_core::config::{AppConfig, LoadOptions};
use promolift_core::domain::article::{ArticleId, CategoryId};
use promolift_core::predictor::PredictionMethod;
use promolift_core::report::{AnalysisReport, PredictionResult};
use promolift_db::{
    AnalysisReportRepository, DbPool, SqlAnalysisReportRepository, SqlPromotionDataProvider,
};

use crate::commands::{
    advisor_failure, failure, load_config, open_pool, runtime, CommandFailure, CommandResult,
};
use crate::store::ConfiguredModelStore;

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[arg(long, required_unless_present = "article", help = "Category to analyze")]
    pub category: Option<String>,
    #[arg(
        long,
        conflicts_with_all = ["category", "persist"],
        help = "Score a single article instead of a whole category"
    )]
    pub article: Option<String>,
    #[arg(long, help = "Reference date (YYYY-MM-DD); defaults to today")]
    pub as_of: Option<NaiveDate>,
    #[arg(long, help = "Also write the full report as pretty JSON to this path")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "Store the report in the analysis_report table")]
    pub persist: bool,
}

/// Either a category report or a single scored article.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Analysis {
    Category(Box<AnalysisReport>),
    Article(Box<PredictionResult>),
}

pub fn run(options: LoadOptions, args: AnalyzeArgs) -> CommandResult {
    if args.category.is_none() && args.article.is_none() {
        return CommandResult::from_failure(
            "analyze",
            failure("configuration", "either --category or --article is required"),
        );
    }
    let config = match load_config("analyze", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let settings = match AdvisorSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(error) => return CommandResult::from_failure("analyze", advisor_failure(error)),
    };

    let runtime = match runtime("analyze") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let run_result = analyze_with_pool(&config, settings, &pool, &args).await;
        pool.close().await;
        run_result
    });

    match result {
        Ok(analysis) => {
            CommandResult::success_with_data("analyze", summary_line(&analysis), &analysis)
        }
        Err(failure) => CommandResult::from_failure("analyze", failure),
    }
}

async fn analyze_with_pool(
    config: &AppConfig,
    settings: AdvisorSettings,
    pool: &DbPool,
    args: &AnalyzeArgs,
) -> Result<Analysis, CommandFailure> {
    let store = ConfiguredModelStore::from_config(&config.training, pool);
    let mut advisor =
        PromotionAdvisor::new(SqlPromotionDataProvider::new(pool.clone()), store, settings)
            .map_err(advisor_failure)?;
    advisor.load_model().await;

    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let analysis = match (&args.article, &args.category) {
        (Some(article_id), _) => Analysis::Article(Box::new(
            advisor
                .analyze_article(&ArticleId(article_id.clone()), as_of)
                .await
                .map_err(advisor_failure)?,
        )),
        (None, Some(category_id)) => {
            let report = advisor
                .analyze(&CategoryId(category_id.clone()), as_of)
                .await
                .map_err(advisor_failure)?;
            if args.persist {
                SqlAnalysisReportRepository::new(pool.clone())
                    .save(&report)
                    .await
                    .map_err(|error| failure("report_persistence", error.to_string()))?;
            }
            Analysis::Category(Box::new(report))
        }
        (None, None) => {
            return Err(failure("configuration", "either --category or --article is required"))
        }
    };

    if let Some(path) = &args.output {
        write_report(path, &analysis)
            .await
            .map_err(|error| failure("output_write", format!("{error:#}")))?;
    }

    Ok(analysis)
}

async fn write_report(path: &Path, report: &impl Serialize) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("encoding analysis report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing analysis report to {}", path.display()))?;
    Ok(())
}

fn summary_line(analysis: &Analysis) -> String {
    let report = match analysis {
        Analysis::Category(report) => report,
        Analysis::Article(result) => {
            return format!(
                "{}: recommend {}% ({}), risk {:?}",
                result.article_name,
                result.promotion_pct,
                result.prediction_method,
                result.risk_level
            );
        }
    };
    let ai = report.summary.method_distribution.get(&PredictionMethod::Ai).copied().unwrap_or(0);
    format!(
        "analyzed {} articles in {} ({} skipped, {} via model); average promotion {:.1}%",
        report.results.len(),
        report.category_name,
        report.skipped.len(),
        ai,
        report.summary.average_promotion_pct
    )
}

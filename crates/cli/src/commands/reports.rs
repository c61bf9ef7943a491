use clap::Args;
use promolift_core::config::LoadOptions;
use promolift_core::domain::article::CategoryId;
use promolift_db::{AnalysisReportRepository, SqlAnalysisReportRepository, StoredReportSummary};

use crate::commands::{failure, load_config, open_pool, runtime, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct ReportsArgs {
    #[arg(long, help = "Category whose stored reports to list")]
    pub category: String,
    #[arg(long, default_value_t = 10, help = "Maximum number of reports, newest first")]
    pub limit: u32,
}

pub fn run(options: LoadOptions, args: ReportsArgs) -> CommandResult {
    let config = match load_config("reports", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("reports") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let listed = SqlAnalysisReportRepository::new(pool.clone())
            .list_for_category(&CategoryId(args.category.clone()), args.limit)
            .await
            .map_err(|error| failure("report_persistence", error.to_string()));
        pool.close().await;
        listed
    });

    match result {
        Ok(reports) => {
            let message = listing_line(&args.category, &reports);
            CommandResult::success_with_data("reports", message, &reports)
        }
        Err(failure) => CommandResult::from_failure("reports", failure),
    }
}

fn listing_line(category: &str, reports: &[StoredReportSummary]) -> String {
    match reports.first() {
        Some(latest) => format!(
            "{} stored reports for {category}; latest {} as of {}",
            reports.len(),
            latest.run_id,
            latest.as_of
        ),
        None => format!("no stored reports for {category}"),
    }
}

use chrono::{NaiveDate, Utc};
use clap::Args;
use promolift_core::advisor::{AdvisorSettings, PromotionAdvisor, TrainingReport, TrainingScope};
use promolift_core::config::{AppConfig, LoadOptions};
use promolift_core::domain::article::CategoryId;
use promolift_core::ml::simulation::DEFAULT_SIMULATED_SAMPLES;
use promolift_db::{DbPool, SqlPromotionDataProvider};

use crate::commands::{
    advisor_failure, failure, load_config, open_pool, runtime, CommandFailure, CommandResult,
};
use crate::store::ConfiguredModelStore;

#[derive(Debug, Clone, Args)]
pub struct TrainArgs {
    #[arg(long, help = "Train on the promotion history of one category")]
    pub category: Option<String>,
    #[arg(long, conflicts_with = "category", help = "Train on the history of every category")]
    pub all: bool,
    #[arg(
        long,
        conflicts_with_all = ["category", "all"],
        help = "Train on seeded simulated promotions instead of recorded history"
    )]
    pub simulate: bool,
    #[arg(long, default_value_t = DEFAULT_SIMULATED_SAMPLES, help = "Simulated sample count")]
    pub samples: usize,
    #[arg(long, help = "Reference date (YYYY-MM-DD); defaults to today")]
    pub as_of: Option<NaiveDate>,
}

impl TrainArgs {
    fn scope(&self) -> Option<TrainingScope> {
        match (&self.category, self.all) {
            (Some(id), _) => Some(TrainingScope::Category(CategoryId(id.clone()))),
            (None, true) => Some(TrainingScope::All),
            (None, false) => None,
        }
    }
}

pub fn run(options: LoadOptions, args: TrainArgs) -> CommandResult {
    if !args.simulate && args.scope().is_none() {
        return CommandResult::from_failure(
            "train",
            failure("configuration", "pass --category <id>, --all or --simulate"),
        );
    }

    let config = match load_config("train", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let settings = match AdvisorSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(error) => return CommandResult::from_failure("train", advisor_failure(error)),
    };

    let runtime = match runtime("train") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let run_result = train_with_pool(&config, settings, &pool, &args).await;
        pool.close().await;
        run_result
    });

    match result {
        Ok(report) => {
            let message = format!(
                "trained {} model on {} examples ({} excluded, scope {}); saved to {}",
                report.model.family, report.examples, report.excluded, report.scope, report.location
            );
            CommandResult::success_with_data("train", message, &report)
        }
        Err(failure) => CommandResult::from_failure("train", failure),
    }
}

async fn train_with_pool(
    config: &AppConfig,
    settings: AdvisorSettings,
    pool: &DbPool,
    args: &TrainArgs,
) -> Result<TrainingReport, CommandFailure> {
    let store = ConfiguredModelStore::from_config(&config.training, pool);
    let mut advisor =
        PromotionAdvisor::new(SqlPromotionDataProvider::new(pool.clone()), store, settings)
            .map_err(advisor_failure)?;
    // a failed run keeps whatever model was current before it
    advisor.load_model().await;

    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let report = match args.scope() {
        Some(scope) if !args.simulate => advisor.train(scope, as_of).await,
        _ => advisor.train_simulated(args.samples, as_of).await,
    };
    report.map_err(advisor_failure)
}

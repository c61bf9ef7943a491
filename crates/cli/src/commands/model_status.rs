use promolift_core::advisor::{AdvisorSettings, ModelState, ModelStatus, PromotionAdvisor};
use promolift_core::config::{LoadOptions, ModelStoreKind};
use promolift_db::SqlPromotionDataProvider;
use serde::Serialize;

use crate::commands::{advisor_failure, load_config, open_pool, runtime, CommandResult};
use crate::store::ConfiguredModelStore;

#[derive(Debug, Serialize)]
struct StatusOutput {
    store: ModelStoreKind,
    #[serde(flatten)]
    status: ModelStatus,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("model-status", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let settings = match AdvisorSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(error) => return CommandResult::from_failure("model-status", advisor_failure(error)),
    };

    let runtime = match runtime("model-status") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let store = ConfiguredModelStore::from_config(&config.training, &pool);
        let kind = store.kind();
        let status = match PromotionAdvisor::new(
            SqlPromotionDataProvider::new(pool.clone()),
            store,
            settings,
        ) {
            Ok(mut advisor) => {
                advisor.load_model().await;
                Ok(StatusOutput { store: kind, status: advisor.model_status() })
            }
            Err(error) => Err(advisor_failure(error)),
        };
        pool.close().await;
        status
    });

    match result {
        Ok(output) => {
            CommandResult::success_with_data("model-status", describe(&output.status), &output)
        }
        Err(failure) => CommandResult::from_failure("model-status", failure),
    }
}

fn describe(status: &ModelStatus) -> String {
    match (status.state, status.family, status.model_id) {
        (ModelState::Trained, Some(family), Some(id)) => {
            format!("trained {family} model {id} is active")
        }
        (ModelState::Stale, _, _) => {
            "stored model does not match the current feature schema; classic scoring is used"
                .to_string()
        }
        _ => "no trained model; classic scoring is used".to_string(),
    }
}

use chrono::NaiveDate;
use promolift_core::config::LoadOptions;
use promolift_db::{DemoDataset, SeedResult};

use crate::commands::{failure, load_config, open_pool, runtime, CommandFailure, CommandResult};

pub fn run(options: LoadOptions, as_of: Option<NaiveDate>) -> CommandResult {
    let config = match load_config("seed", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let dataset = as_of.map(DemoDataset::build).unwrap_or_default();
    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        let run_result = async {
            let seeded = dataset
                .seed(&pool)
                .await
                .map_err(|error| failure("seed_execution", error.to_string()))?;
            let verification = dataset
                .verify(&pool)
                .await
                .map_err(|error| failure("seed_execution", error.to_string()))?;
            if !verification.all_present {
                let failed_checks = verification
                    .checks
                    .iter()
                    .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                    .collect::<Vec<_>>();
                return Err(failure("seed_verification", verification_message(&failed_checks)));
            }
            Ok::<SeedResult, CommandFailure>(seeded)
        }
        .await;

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => {
            let message = format!(
                "demo category {} seeded as of {}: {} articles, {} sales, {} injections, {} promotions ({} trainable)",
                seeded.category_id,
                seeded.as_of,
                seeded.articles,
                seeded.sales,
                seeded.injections,
                seeded.promotions,
                seeded.trainable_promotions
            );
            CommandResult::success_with_data("seed", message, &seeded)
        }
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("category", true), ("ART-KETTLE-sales", false), ("ART-BLENDER-promotions", false)];

        let failed_checks = checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();

        assert_eq!(
            verification_message(&failed_checks),
            "seed verification failed for checks: ART-KETTLE-sales, ART-BLENDER-promotions"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "some seed data failed to load");
    }
}

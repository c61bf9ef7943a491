use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use promolift_core::config::{resolve_config_path, AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = resolve_config_path(explicit_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<ConfigEntry> = fields(&config)
        .into_iter()
        .map(|(key, value, env_keys)| ConfigEntry {
            key,
            value,
            source: field_source(
                key,
                env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect();

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];
    lines.extend(entries.iter().map(render_line));
    CommandResult::success_with_data("config", lines.join("\n"), &entries)
}

type Field = (&'static str, String, &'static [&'static str]);

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    (key, value, env_keys)
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("database.url", config.database.url.clone(), &["PROMOLIFT_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PROMOLIFT_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PROMOLIFT_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["PROMOLIFT_LOGGING_LEVEL", "PROMOLIFT_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["PROMOLIFT_LOGGING_FORMAT", "PROMOLIFT_LOG_FORMAT"],
        ),
        field("scoring.rotation_weight", config.scoring.rotation_weight.to_string(), &[]),
        field("scoring.elasticity_weight", config.scoring.elasticity_weight.to_string(), &[]),
        field("scoring.sales_trend_weight", config.scoring.sales_trend_weight.to_string(), &[]),
        field(
            "scoring.promotion_fatigue_weight",
            config.scoring.promotion_fatigue_weight.to_string(),
            &[],
        ),
        field(
            "scoring.min_promotion_pct",
            config.scoring.min_promotion_pct.to_string(),
            &["PROMOLIFT_SCORING_MIN_PROMOTION_PCT"],
        ),
        field(
            "scoring.max_promotion_pct",
            config.scoring.max_promotion_pct.to_string(),
            &["PROMOLIFT_SCORING_MAX_PROMOTION_PCT"],
        ),
        field(
            "scoring.stock_critical",
            config.scoring.stock_critical.to_string(),
            &["PROMOLIFT_SCORING_STOCK_CRITICAL"],
        ),
        field(
            "scoring.stock_excess",
            config.scoring.stock_excess.to_string(),
            &["PROMOLIFT_SCORING_STOCK_EXCESS"],
        ),
        field(
            "analysis.sales_window_days",
            config.analysis.sales_window_days.to_string(),
            &["PROMOLIFT_ANALYSIS_SALES_WINDOW_DAYS"],
        ),
        field(
            "analysis.promotion_lookback_days",
            config.analysis.promotion_lookback_days.to_string(),
            &[],
        ),
        field(
            "analysis.fatigue_half_life_days",
            config.analysis.fatigue_half_life_days.to_string(),
            &[],
        ),
        field("analysis.baseline_days", config.analysis.baseline_days.to_string(), &[]),
        field(
            "analysis.projection_horizon_days",
            config.analysis.projection_horizon_days.to_string(),
            &["PROMOLIFT_ANALYSIS_PROJECTION_HORIZON_DAYS"],
        ),
        field(
            "training.min_examples",
            config.training.min_examples.to_string(),
            &["PROMOLIFT_TRAINING_MIN_EXAMPLES"],
        ),
        field("training.holdout_ratio", config.training.holdout_ratio.to_string(), &[]),
        field("training.seed", config.training.seed.to_string(), &["PROMOLIFT_TRAINING_SEED"]),
        field(
            "training.model_store",
            format!("{:?}", config.training.model_store).to_lowercase(),
            &["PROMOLIFT_TRAINING_MODEL_STORE"],
        ),
        field(
            "training.model_path",
            config.training.model_path.display().to_string(),
            &["PROMOLIFT_TRAINING_MODEL_PATH"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(entry: &ConfigEntry) -> String {
    format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)
}

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source};

    #[test]
    fn file_source_requires_the_full_key_path() {
        let doc: toml::Value = "[scoring]\nmax_promotion_pct = 40\n".parse().expect("toml");
        assert!(contains_path(&doc, "scoring.max_promotion_pct"));
        assert!(!contains_path(&doc, "scoring.min_promotion_pct"));
        assert!(!contains_path(&doc, "training.seed"));
    }

    #[test]
    fn unset_keys_fall_back_to_default_source() {
        let doc: toml::Value = "[training]\nseed = 7\n".parse().expect("toml");
        assert_eq!(
            field_source("training.seed", &["PROMOLIFT_CONFIG_TEST_UNSET"], Some(&doc), None),
            "file (config file)"
        );
        assert_eq!(field_source("training.holdout_ratio", &[], Some(&doc), None), "default");
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureWindows;
use crate::impact::StockThresholds;
use crate::ml::selection::TrainerSettings;
use crate::scoring::{PromotionBounds, ScoreWeights};

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["promolift.toml", "config/promolift.toml"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scoring: ScoringConfig,
    pub analysis: AnalysisConfig,
    pub training: TrainingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub rotation_weight: f64,
    pub elasticity_weight: f64,
    pub sales_trend_weight: f64,
    pub promotion_fatigue_weight: f64,
    pub min_promotion_pct: u32,
    pub max_promotion_pct: u32,
    pub stock_critical: i64,
    pub stock_excess: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub sales_window_days: u32,
    pub promotion_lookback_days: u32,
    pub fatigue_half_life_days: u32,
    pub baseline_days: u32,
    pub projection_horizon_days: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingConfig {
    pub min_examples: usize,
    pub holdout_ratio: f64,
    pub seed: u64,
    pub model_store: ModelStoreKind,
    pub model_path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStoreKind {
    File,
    Database,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub min_promotion_pct: Option<u32>,
    pub max_promotion_pct: Option<u32>,
    pub model_store: Option<ModelStoreKind>,
    pub model_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let weights = ScoreWeights::default();
        let bounds = PromotionBounds::default();
        let stock = StockThresholds::default();
        let windows = FeatureWindows::default();
        let trainer = TrainerSettings::default();

        Self {
            database: DatabaseConfig {
                url: "sqlite://promolift.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            scoring: ScoringConfig {
                rotation_weight: weights.rotation,
                elasticity_weight: weights.elasticity,
                sales_trend_weight: weights.sales_trend,
                promotion_fatigue_weight: weights.promotion_fatigue,
                min_promotion_pct: bounds.min_promotion_pct,
                max_promotion_pct: bounds.max_promotion_pct,
                stock_critical: stock.stock_critical,
                stock_excess: stock.stock_excess,
            },
            analysis: AnalysisConfig {
                sales_window_days: windows.sales_window_days,
                promotion_lookback_days: windows.promotion_lookback_days,
                fatigue_half_life_days: windows.fatigue_half_life_days,
                baseline_days: windows.baseline_days,
                projection_horizon_days: 30,
            },
            training: TrainingConfig {
                min_examples: trainer.min_examples,
                holdout_ratio: trainer.holdout_ratio,
                seed: trainer.seed,
                model_store: ModelStoreKind::File,
                model_path: PathBuf::from("trained_models/promotion_model.json"),
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for ModelStoreKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "database" | "db" => Ok(Self::Database),
            other => Err(ConfigError::Validation(format!(
                "unsupported model store `{other}` (expected file|database)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn score_weights(&self) -> ScoreWeights {
        ScoreWeights {
            rotation: self.scoring.rotation_weight,
            elasticity: self.scoring.elasticity_weight,
            sales_trend: self.scoring.sales_trend_weight,
            promotion_fatigue: self.scoring.promotion_fatigue_weight,
        }
    }

    pub fn promotion_bounds(&self) -> PromotionBounds {
        PromotionBounds {
            min_promotion_pct: self.scoring.min_promotion_pct,
            max_promotion_pct: self.scoring.max_promotion_pct,
        }
    }

    pub fn stock_thresholds(&self) -> StockThresholds {
        StockThresholds {
            stock_critical: self.scoring.stock_critical,
            stock_excess: self.scoring.stock_excess,
        }
    }

    pub fn feature_windows(&self) -> FeatureWindows {
        FeatureWindows {
            sales_window_days: self.analysis.sales_window_days,
            promotion_lookback_days: self.analysis.promotion_lookback_days,
            fatigue_half_life_days: self.analysis.fatigue_half_life_days,
            baseline_days: self.analysis.baseline_days,
        }
    }

    pub fn trainer_settings(&self) -> TrainerSettings {
        TrainerSettings {
            min_examples: self.training.min_examples,
            holdout_ratio: self.training.holdout_ratio,
            seed: self.training.seed,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(scoring) = patch.scoring {
            if let Some(value) = scoring.rotation_weight {
                self.scoring.rotation_weight = value;
            }
            if let Some(value) = scoring.elasticity_weight {
                self.scoring.elasticity_weight = value;
            }
            if let Some(value) = scoring.sales_trend_weight {
                self.scoring.sales_trend_weight = value;
            }
            if let Some(value) = scoring.promotion_fatigue_weight {
                self.scoring.promotion_fatigue_weight = value;
            }
            if let Some(value) = scoring.min_promotion_pct {
                self.scoring.min_promotion_pct = value;
            }
            if let Some(value) = scoring.max_promotion_pct {
                self.scoring.max_promotion_pct = value;
            }
            if let Some(value) = scoring.stock_critical {
                self.scoring.stock_critical = value;
            }
            if let Some(value) = scoring.stock_excess {
                self.scoring.stock_excess = value;
            }
        }

        if let Some(analysis) = patch.analysis {
            if let Some(value) = analysis.sales_window_days {
                self.analysis.sales_window_days = value;
            }
            if let Some(value) = analysis.promotion_lookback_days {
                self.analysis.promotion_lookback_days = value;
            }
            if let Some(value) = analysis.fatigue_half_life_days {
                self.analysis.fatigue_half_life_days = value;
            }
            if let Some(value) = analysis.baseline_days {
                self.analysis.baseline_days = value;
            }
            if let Some(value) = analysis.projection_horizon_days {
                self.analysis.projection_horizon_days = value;
            }
        }

        if let Some(training) = patch.training {
            if let Some(value) = training.min_examples {
                self.training.min_examples = value;
            }
            if let Some(value) = training.holdout_ratio {
                self.training.holdout_ratio = value;
            }
            if let Some(value) = training.seed {
                self.training.seed = value;
            }
            if let Some(value) = training.model_store {
                self.training.model_store = value;
            }
            if let Some(value) = training.model_path {
                self.training.model_path = value;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROMOLIFT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PROMOLIFT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("PROMOLIFT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("PROMOLIFT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("PROMOLIFT_LOGGING_LEVEL").or_else(|| read_env("PROMOLIFT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROMOLIFT_LOGGING_FORMAT").or_else(|| read_env("PROMOLIFT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("PROMOLIFT_SCORING_MIN_PROMOTION_PCT") {
            self.scoring.min_promotion_pct =
                parse_env("PROMOLIFT_SCORING_MIN_PROMOTION_PCT", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_SCORING_MAX_PROMOTION_PCT") {
            self.scoring.max_promotion_pct =
                parse_env("PROMOLIFT_SCORING_MAX_PROMOTION_PCT", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_SCORING_STOCK_CRITICAL") {
            self.scoring.stock_critical = parse_env("PROMOLIFT_SCORING_STOCK_CRITICAL", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_SCORING_STOCK_EXCESS") {
            self.scoring.stock_excess = parse_env("PROMOLIFT_SCORING_STOCK_EXCESS", &value)?;
        }

        if let Some(value) = read_env("PROMOLIFT_ANALYSIS_SALES_WINDOW_DAYS") {
            self.analysis.sales_window_days =
                parse_env("PROMOLIFT_ANALYSIS_SALES_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_ANALYSIS_PROJECTION_HORIZON_DAYS") {
            self.analysis.projection_horizon_days =
                parse_env("PROMOLIFT_ANALYSIS_PROJECTION_HORIZON_DAYS", &value)?;
        }

        if let Some(value) = read_env("PROMOLIFT_TRAINING_MIN_EXAMPLES") {
            self.training.min_examples = parse_env("PROMOLIFT_TRAINING_MIN_EXAMPLES", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_TRAINING_SEED") {
            self.training.seed = parse_env("PROMOLIFT_TRAINING_SEED", &value)?;
        }
        if let Some(value) = read_env("PROMOLIFT_TRAINING_MODEL_STORE") {
            self.training.model_store = value.parse()?;
        }
        if let Some(value) = read_env("PROMOLIFT_TRAINING_MODEL_PATH") {
            self.training.model_path = PathBuf::from(value);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(min_promotion_pct) = overrides.min_promotion_pct {
            self.scoring.min_promotion_pct = min_promotion_pct;
        }
        if let Some(max_promotion_pct) = overrides.max_promotion_pct {
            self.scoring.max_promotion_pct = max_promotion_pct;
        }
        if let Some(model_store) = overrides.model_store {
            self.training.model_store = model_store;
        }
        if let Some(model_path) = overrides.model_path {
            self.training.model_path = model_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_scoring(self)?;
        validate_analysis(&self.analysis)?;
        validate_training(&self.training)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_scoring(config: &AppConfig) -> Result<(), ConfigError> {
    config
        .score_weights()
        .normalized()
        .map_err(|error| ConfigError::Validation(format!("scoring weights: {error}")))?;
    config
        .promotion_bounds()
        .validate()
        .map_err(|error| ConfigError::Validation(format!("scoring bounds: {error}")))?;

    if config.scoring.stock_critical < 0 || config.scoring.stock_excess <= config.scoring.stock_critical
    {
        return Err(ConfigError::Validation(
            "scoring.stock_excess must be greater than scoring.stock_critical (both non-negative)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    let windows = [
        ("analysis.sales_window_days", analysis.sales_window_days),
        ("analysis.promotion_lookback_days", analysis.promotion_lookback_days),
        ("analysis.fatigue_half_life_days", analysis.fatigue_half_life_days),
        ("analysis.baseline_days", analysis.baseline_days),
        ("analysis.projection_horizon_days", analysis.projection_horizon_days),
    ];
    for (name, days) in windows {
        if days == 0 || days > 3650 {
            return Err(ConfigError::Validation(format!("{name} must be in range 1..=3650")));
        }
    }
    if analysis.sales_window_days < 2 {
        return Err(ConfigError::Validation(
            "analysis.sales_window_days must cover at least two days".to_string(),
        ));
    }
    Ok(())
}

fn validate_training(training: &TrainingConfig) -> Result<(), ConfigError> {
    if !(training.holdout_ratio > 0.0 && training.holdout_ratio < 1.0) {
        return Err(ConfigError::Validation(
            "training.holdout_ratio must be strictly between 0 and 1".to_string(),
        ));
    }
    if training.min_examples < 3 {
        return Err(ConfigError::Validation(
            "training.min_examples must be at least 3".to_string(),
        ));
    }
    if training.model_store == ModelStoreKind::File
        && training.model_path.as_os_str().is_empty()
    {
        return Err(ConfigError::Validation(
            "training.model_path is required for the file model store".to_string(),
        ));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    scoring: Option<ScoringPatch>,
    analysis: Option<AnalysisPatch>,
    training: Option<TrainingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    rotation_weight: Option<f64>,
    elasticity_weight: Option<f64>,
    sales_trend_weight: Option<f64>,
    promotion_fatigue_weight: Option<f64>,
    min_promotion_pct: Option<u32>,
    max_promotion_pct: Option<u32>,
    stock_critical: Option<i64>,
    stock_excess: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    sales_window_days: Option<u32>,
    promotion_lookback_days: Option<u32>,
    fatigue_half_life_days: Option<u32>,
    baseline_days: Option<u32>,
    projection_horizon_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TrainingPatch {
    min_examples: Option<usize>,
    holdout_ratio: Option<f64>,
    seed: Option<u64>,
    model_store: Option<ModelStoreKind>,
    model_path: Option<PathBuf>,
}

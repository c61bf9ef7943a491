pub mod commands;
pub mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use promolift_core::config::{AppConfig, ConfigOverrides, LoadOptions};

use commands::analyze::AnalyzeArgs;
use commands::reports::ReportsArgs;
use commands::train::TrainArgs;

#[derive(Debug, Parser)]
#[command(
    name = "promolift",
    about = "Promotion percentage recommender",
    long_about = "Score articles of a category, train the promotion outcome model and inspect configuration.",
    after_help = "Examples:\n  promolift migrate\n  promolift seed\n  promolift train --category CAT-KITCHEN --as-of 2025-06-30\n  promolift analyze --category CAT-KITCHEN --persist\n  promolift reports --category CAT-KITCHEN"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a promolift.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo category with its sales and promotion history")]
    Seed {
        #[arg(long, help = "Reference date the demo history ends at (YYYY-MM-DD)")]
        as_of: Option<NaiveDate>,
    },
    #[command(about = "Train and select the promotion outcome model")]
    Train(TrainArgs),
    #[command(about = "Recommend a promotion percentage for every article of a category")]
    Analyze(AnalyzeArgs),
    #[command(about = "Report whether a trained model is active")]
    ModelStatus,
    #[command(about = "List analysis reports stored with --persist")]
    Reports(ReportsArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    // config errors are reported by the command itself
    if let Ok(config) = AppConfig::load(options.clone()) {
        if let Err(error) = init_logging(&config) {
            eprintln!("promolift: logging disabled: {error}");
        }
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options),
        Command::Seed { as_of } => commands::seed::run(options, as_of),
        Command::Train(args) => commands::train::run(options, args),
        Command::Analyze(args) => commands::analyze::run(options, args),
        Command::ModelStatus => commands::model_status::run(options),
        Command::Reports(args) => commands::reports::run(options, args),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr; stdout carries only the command outcome.
fn init_logging(config: &AppConfig) -> Result<(), LoggingInitError> {
    use promolift_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    }
}

type LoggingInitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use clap::Parser;

    use promolift_core::config::AppConfig;

    use super::{init_logging, Cli, Command};

    #[test]
    fn train_scope_flags_conflict() {
        assert!(Cli::try_parse_from(["promolift", "train", "--category", "C-1", "--all"]).is_err());
        assert!(Cli::try_parse_from(["promolift", "train", "--all", "--simulate"]).is_err());
        assert!(Cli::try_parse_from(["promolift", "train", "--simulate", "--samples", "50"]).is_ok());
    }

    #[test]
    fn analyze_requires_a_category_and_parses_dates() {
        assert!(Cli::try_parse_from(["promolift", "analyze"]).is_err());
        assert!(Cli::try_parse_from(["promolift", "analyze", "--category", "C-1", "--as-of", "06/30"])
            .is_err());

        let cli = Cli::try_parse_from([
            "promolift",
            "analyze",
            "--category",
            "C-1",
            "--as-of",
            "2025-06-30",
            "--persist",
        ])
        .expect("valid arguments");
        match cli.command {
            Command::Analyze(args) => {
                assert_eq!(args.category.as_deref(), Some("C-1"));
                assert!(args.persist);
                assert_eq!(args.as_of.map(|d| d.to_string()).as_deref(), Some("2025-06-30"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn single_article_analysis_excludes_category_and_persist() {
        assert!(Cli::try_parse_from(["promolift", "analyze", "--article", "A-1"]).is_ok());
        assert!(Cli::try_parse_from(["promolift", "analyze", "--article", "A-1", "--category", "C-1"])
            .is_err());
        assert!(Cli::try_parse_from(["promolift", "analyze", "--article", "A-1", "--persist"]).is_err());
    }

    #[test]
    fn repeated_logging_setup_is_reported() {
        let config = AppConfig::default();
        // the first call may lose to another test that already installed a subscriber
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }

    #[test]
    fn global_database_url_becomes_an_override() {
        let cli = Cli::try_parse_from(["promolift", "model-status", "--database-url", "sqlite::memory:"])
            .expect("valid arguments");
        let options = cli.load_options();
        assert_eq!(options.overrides.database_url.as_deref(), Some("sqlite::memory:"));
        assert!(!options.require_file);
    }
}

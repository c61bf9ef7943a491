pub mod analyze;
pub mod config;
pub mod migrate;
pub mod model_status;
pub mod reports;
pub mod seed;
pub mod train;

use promolift_core::config::{AppConfig, LoadOptions};
use promolift_core::errors::AdvisorError;
use promolift_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;

/// `(error_class, message, exit_code)` carried out of an async command body.
pub type CommandFailure = (&'static str, String, u8);

/// Exit code per error class. Every class maps to its own code.
pub const EXIT_CODES: &[(&str, u8)] = &[
    ("config_validation", 2),
    ("runtime_init", 3),
    ("db_connectivity", 4),
    ("migration", 5),
    ("seed_execution", 6),
    ("seed_verification", 7),
    ("data_not_found", 8),
    ("insufficient_data", 9),
    ("data_access", 10),
    ("model_store", 11),
    ("training", 12),
    ("configuration", 13),
    ("output_write", 14),
    ("report_persistence", 15),
];

pub fn exit_code_for(error_class: &str) -> u8 {
    EXIT_CODES.iter().find(|(class, _)| *class == error_class).map(|(_, code)| *code).unwrap_or(1)
}

pub fn failure(error_class: &'static str, message: impl Into<String>) -> CommandFailure {
    (error_class, message.into(), exit_code_for(error_class))
}

pub fn advisor_failure(error: AdvisorError) -> CommandFailure {
    let class = error.error_class();
    (class, format!("{} ({error})", error.user_message()), exit_code_for(class))
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_failure(command: &str, (error_class, message, exit_code): CommandFailure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options).map_err(|error| {
        CommandResult::from_failure(
            command,
            failure("config_validation", format!("configuration issue: {error}")),
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::from_failure(
            command,
            failure("runtime_init", format!("failed to initialize async runtime: {error}")),
        )
    })
}

/// Connect and bring the schema up to date. Every command that touches the
/// database goes through here so a fresh file is always usable.
pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| failure("db_connectivity", error.to_string()))?;
    if let Err(error) = migrations::run_pending(&pool).await {
        pool.close().await;
        return Err(failure("migration", error.to_string()));
    }
    Ok(pool)
}

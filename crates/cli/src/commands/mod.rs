pub mod config;
pub mod doctor;
pub mod migrate;
pub mod reresolve;
pub mod resolve;
pub mod seed;

use std::sync::Arc;

use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_core::settings::LayeredSettings;
use reqflow_core::workflow::{ResolutionErrorClass, ResolutionService, WorkflowResolver};
use reqflow_core::{LogNotifier, ResolutionError};
use reqflow_db::{
    DbPool, SqlDirectoryRepository, SqlRequisitionRepository, SqlSettingsRepository,
    SqlThresholdRepository,
};
use serde::Serialize;
use serde_json::{json, Value};

const CLI_ACTOR: &str = "reqflow-cli";

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
        Self::ok(command, message, None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        Self::ok(command, message, Some(data))
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::error(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Value,
    ) -> Self {
        Self::error(command, error_class, message, exit_code, Some(data))
    }

    fn ok(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    fn error(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_resolution_error(
        command: &str,
        error: &ResolutionError,
        correlation_id: &str,
    ) -> Self {
        let class = error.class();
        let interface = error.clone().into_interface(correlation_id);
        Self::failure_with_data(
            command,
            class.as_str(),
            error.to_string(),
            resolution_exit_code(class),
            json!({
                "correlation_id": interface.correlation_id(),
                "hint": interface.operator_hint(),
            }),
        )
    }
}

pub(crate) fn resolution_exit_code(class: ResolutionErrorClass) -> u8 {
    match class {
        ResolutionErrorClass::Configuration => 7,
        ResolutionErrorClass::Validation => 8,
        ResolutionErrorClass::NotFound => 9,
        ResolutionErrorClass::Persistence => 10,
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Resolution service backed by SQL adapters. Database settings win over `[settings]`
/// defaults from the config file.
pub(crate) fn workflow_service(pool: &DbPool, config: &AppConfig) -> ResolutionService {
    let resolver = WorkflowResolver::new(
        Arc::new(SqlDirectoryRepository::new(pool.clone())),
        Arc::new(SqlThresholdRepository::new(pool.clone())),
    );
    let settings = LayeredSettings::new(
        SqlSettingsRepository::new(pool.clone()),
        config.settings_provider(),
    );

    ResolutionService::new(
        resolver,
        Arc::new(SqlRequisitionRepository::new(pool.clone())),
        Arc::new(settings),
    )
    .with_notifier(Arc::new(LogNotifier))
    .with_actor(CLI_ACTOR)
}

pub(crate) fn correlation_id() -> String {
    format!("cli-{}", uuid::Uuid::new_v4())
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

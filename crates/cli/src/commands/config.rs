use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_core::settings::{keys, normalize_setting_key};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["REQFLOW_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["REQFLOW_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["REQFLOW_DATABASE_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["REQFLOW_LOGGING_LEVEL", "REQFLOW_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        config.logging.format.as_str(),
        source("logging.format", &["REQFLOW_LOGGING_FORMAT", "REQFLOW_LOG_FORMAT"]),
    ));

    lines.push("workflow setting defaults (system_setting rows take precedence):".to_string());
    for key in keys::ALL {
        let value = config
            .settings
            .get(*key)
            .map(|value| value.to_storage_string())
            .unwrap_or_else(|| "<built-in>".to_string());
        let env_key = format!("REQFLOW_SETTING_{key}");
        lines.push(render_line(
            &format!("settings.{key}"),
            &value,
            setting_source(key, &env_key, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("reqflow.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/reqflow.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
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

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        return file_source(config_file_path);
    }

    "default".to_string()
}

/// Settings keys are matched case-insensitively in the `[settings]` table.
fn setting_source(
    key: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    let in_file = config_file_doc
        .and_then(|doc| doc.get("settings"))
        .and_then(Value::as_table)
        .is_some_and(|table| table.keys().any(|candidate| normalize_setting_key(candidate) == key));
    if in_file {
        return file_source(config_file_path);
    }

    "default".to_string()
}

fn file_source(config_file_path: Option<&Path>) -> String {
    let file_path = config_file_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "config file".to_string());
    format!("file ({file_path})")
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

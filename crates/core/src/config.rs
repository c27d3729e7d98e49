use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::{keys, normalize_setting_key, InMemorySettings, SettingValue};

pub const CONFIG_FILE_NAME: &str = "reqflow.toml";
const SETTING_ENV_PREFIX: &str = "REQFLOW_SETTING_";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    /// Workflow setting defaults, consulted when the `system_setting` table has no row.
    pub settings: BTreeMap<String, SettingValue>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub settings: BTreeMap<String, SettingValue>,
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
        Self {
            database: DatabaseConfig {
                url: "sqlite://reqflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            settings: BTreeMap::new(),
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Configured setting defaults as a provider, for layering beneath the database.
    pub fn settings_provider(&self) -> InMemorySettings {
        self.settings.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
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

        if let Some(settings) = patch.settings {
            for (key, value) in settings {
                self.settings.insert(normalize_setting_key(&key), SettingValue::from_toml(value));
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        const MAX_CONNECTIONS: &str = "REQFLOW_DATABASE_MAX_CONNECTIONS";
        const TIMEOUT_SECS: &str = "REQFLOW_DATABASE_TIMEOUT_SECS";

        if let Some(url) = read_env("REQFLOW_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(raw) = read_env(MAX_CONNECTIONS) {
            self.database.max_connections = parse_env(MAX_CONNECTIONS, &raw)?;
        }
        if let Some(raw) = read_env(TIMEOUT_SECS) {
            self.database.timeout_secs = parse_env(TIMEOUT_SECS, &raw)?;
        }

        // The long names win over the short aliases.
        if let Some(level) = first_env(&["REQFLOW_LOGGING_LEVEL", "REQFLOW_LOG_LEVEL"]) {
            self.logging.level = level;
        }
        if let Some(format) = first_env(&["REQFLOW_LOGGING_FORMAT", "REQFLOW_LOG_FORMAT"]) {
            self.logging.format = format.parse()?;
        }

        let from_env = keys::ALL.iter().filter_map(|key| {
            read_env(&format!("{SETTING_ENV_PREFIX}{key}"))
                .map(|raw| ((*key).to_string(), SettingValue::Text(raw)))
        });
        self.settings.extend(from_env);

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
        for (key, value) in overrides.settings {
            self.settings.insert(normalize_setting_key(&key), value);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_settings(&self.settings)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), Path::new("config").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references; an unset variable is an error rather than an empty string.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after_open[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after_open[end + 1..];
    }

    output.push_str(rest);
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

fn validate_settings(settings: &BTreeMap<String, SettingValue>) -> Result<(), ConfigError> {
    let unknown: Vec<&str> = settings
        .keys()
        .map(String::as_str)
        .filter(|key| !keys::ALL.contains(key))
        .collect();
    if !unknown.is_empty() {
        return Err(ConfigError::Validation(format!(
            "unknown workflow settings: {} (expected one of {})",
            unknown.join(", "),
            keys::ALL.join("|")
        )));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    settings: Option<BTreeMap<String, toml::Value>>,
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

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::settings::{keys, SettingValue, SettingsProvider};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn database_url_expands_environment_references() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_REQFLOW_DB_PATH", "/var/lib/reqflow/ledger.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("reqflow.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_REQFLOW_DB_PATH}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///var/lib/reqflow/ledger.db",
                "database url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_REQFLOW_DB_PATH"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_REQFLOW_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("reqflow.toml");
        fs::write(&path, "[database]\nurl = \"${TEST_REQFLOW_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(
                error,
                ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_REQFLOW_UNSET"
            ),
            "error should name the missing variable",
        )
    }

    #[test]
    fn short_logging_aliases_apply_when_long_names_are_unset() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("REQFLOW_LOG_LEVEL", "warn");
        env::set_var("REQFLOW_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["REQFLOW_LOG_LEVEL", "REQFLOW_LOG_FORMAT"]);
        result
    }

    #[test]
    fn overrides_beat_env_beat_file_beat_defaults() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("REQFLOW_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("REQFLOW_SETTING_FAST_TRACK_ENABLED", "false");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("reqflow.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"
max_connections = 2

[logging]
level = "warn"

[settings]
FAST_TRACK_ENABLED = true
max_approvals_per_requisition = 4
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.database.max_connections == 2, "file value should beat defaults")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.settings.get(keys::FAST_TRACK_ENABLED)
                    == Some(&SettingValue::Text("false".to_string())),
                "env setting should win over file",
            )?;
            ensure(
                config.settings.get(keys::MAX_APPROVALS_PER_REQUISITION)
                    == Some(&SettingValue::Integer(4)),
                "file setting keys should be normalized to upper case",
            )?;
            Ok(())
        })();

        clear_vars(&["REQFLOW_DATABASE_URL", "REQFLOW_SETTING_FAST_TRACK_ENABLED"]);
        result
    }

    #[test]
    fn non_sqlite_database_url_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("REQFLOW_DATABASE_URL", "postgres://localhost/reqflow");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("database.url")
            );
            ensure(has_message, "validation failure should mention database.url")
        })();

        clear_vars(&["REQFLOW_DATABASE_URL"]);
        result
    }

    #[test]
    fn malformed_numeric_env_override_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("REQFLOW_DATABASE_MAX_CONNECTIONS", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected a malformed override to fail".to_string()),
            Err(error) => ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "REQFLOW_DATABASE_MAX_CONNECTIONS"
                ),
                "error should name the offending variable",
            ),
        };

        clear_vars(&["REQFLOW_DATABASE_MAX_CONNECTIONS"]);
        result
    }

    #[test]
    fn unterminated_reference_is_reported() -> Result<(), String> {
        let error = match super::interpolate_env_vars("url = \"${REQFLOW_DB\"") {
            Ok(_) => return Err("expected unterminated reference to fail".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::UnterminatedInterpolation),
            "missing closing brace should be reported",
        )
    }

    #[test]
    fn unknown_setting_keys_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let mut overrides = ConfigOverrides::default();
        overrides.settings.insert("MAX_APROVALS".to_string(), SettingValue::Integer(3));

        let error = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
            Ok(_) => return Err("expected unknown setting to be rejected".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("MAX_APROVALS")
            ),
            "validation failure should name the unknown key",
        )
    }

    #[tokio::test]
    async fn configured_settings_are_exposed_as_a_provider() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.settings.insert(keys::ALLOW_SELF_APPROVAL.to_string(), SettingValue::Boolean(true));

        let provider = config.settings_provider();
        let value = provider
            .get_setting("allow_self_approval")
            .await
            .map_err(|err| err.to_string())?;
        ensure(value == Some(SettingValue::Boolean(true)), "setting should be readable by key")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }
}

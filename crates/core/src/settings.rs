//! Typed key/value settings consumed by the approval-workflow resolver.
//!
//! Settings are stored as loosely typed values (text, integer, boolean, JSON) and
//! read once per resolution into a [`WorkflowSettings`] snapshot, so every decision
//! in a single run sees the same configuration.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ApplicationError;

pub mod keys {
    pub const MAX_REQUISITION_AMOUNT: &str = "MAX_REQUISITION_AMOUNT";
    pub const ALLOW_SELF_APPROVAL: &str = "ALLOW_SELF_APPROVAL";
    pub const MAX_PAYMENT_AMOUNT_WITHOUT_CFO: &str = "MAX_PAYMENT_AMOUNT_WITHOUT_CFO";
    pub const MAX_PAYMENT_AMOUNT_WITHOUT_CEO: &str = "MAX_PAYMENT_AMOUNT_WITHOUT_CEO";
    pub const FAST_TRACK_ENABLED: &str = "FAST_TRACK_ENABLED";
    pub const MAX_APPROVALS_PER_REQUISITION: &str = "MAX_APPROVALS_PER_REQUISITION";
    pub const TRACK_WORKFLOW_METRICS: &str = "TRACK_WORKFLOW_METRICS";
    pub const END_TO_END_SLA_DAYS: &str = "END_TO_END_SLA_DAYS";
    pub const PAYMENT_SLA_HOURS: &str = "PAYMENT_SLA_HOURS";
    pub const APPROVAL_EMAIL_NOTIFICATIONS: &str = "APPROVAL_EMAIL_NOTIFICATIONS";
    pub const BUSINESS_HOURS_ONLY: &str = "BUSINESS_HOURS_ONLY";
    pub const WEEKEND_PROCESSING: &str = "WEEKEND_PROCESSING";
    pub const PARALLEL_APPROVAL_ENABLED: &str = "PARALLEL_APPROVAL_ENABLED";

    pub const ALL: &[&str] = &[
        MAX_REQUISITION_AMOUNT,
        ALLOW_SELF_APPROVAL,
        MAX_PAYMENT_AMOUNT_WITHOUT_CFO,
        MAX_PAYMENT_AMOUNT_WITHOUT_CEO,
        FAST_TRACK_ENABLED,
        MAX_APPROVALS_PER_REQUISITION,
        TRACK_WORKFLOW_METRICS,
        END_TO_END_SLA_DAYS,
        PAYMENT_SLA_HOURS,
        APPROVAL_EMAIL_NOTIFICATIONS,
        BUSINESS_HOURS_ONLY,
        WEEKEND_PROCESSING,
        PARALLEL_APPROVAL_ENABLED,
    ];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Boolean(_) => "boolean",
            Self::Json(_) => "json",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::Integer(value) => Some(*value != 0),
            Self::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            Self::Json(serde_json::Value::Bool(value)) => Some(*value),
            Self::Json(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
            Self::Json(serde_json::Value::Number(number)) => number.as_i64(),
            Self::Boolean(_) | Self::Json(_) => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(value) => Some(Decimal::from(*value)),
            Self::Text(value) => Decimal::from_str(value.trim().replace(',', "").as_str()).ok(),
            Self::Json(serde_json::Value::Number(number)) => {
                Decimal::from_str(&number.to_string()).ok()
            }
            Self::Boolean(_) | Self::Json(_) => None,
        }
    }

    /// Stored representation, paired with [`SettingValue::type_name`].
    pub fn to_storage_string(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::Json(value) => value.to_string(),
        }
    }

    pub fn from_storage(value_type: &str, raw: &str) -> Result<Self, ApplicationError> {
        let invalid = || {
            ApplicationError::Configuration(format!(
                "stored setting value `{raw}` is not a valid {value_type}"
            ))
        };

        match value_type.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(Self::Text(raw.to_string())),
            "integer" | "int" => raw.trim().parse().map(Self::Integer).map_err(|_| invalid()),
            "boolean" | "bool" => {
                Self::Text(raw.to_string()).as_bool().map(Self::Boolean).ok_or_else(invalid)
            }
            "json" => serde_json::from_str(raw).map(Self::Json).map_err(|_| invalid()),
            other => Err(ApplicationError::Configuration(format!(
                "unsupported setting type `{other}` (expected text|integer|boolean|json)"
            ))),
        }
    }

    pub fn from_toml(value: toml::Value) -> Self {
        match value {
            toml::Value::String(value) => Self::Text(value),
            toml::Value::Integer(value) => Self::Integer(value),
            toml::Value::Boolean(value) => Self::Boolean(value),
            toml::Value::Float(value) => Self::Text(value.to_string()),
            other => Self::Json(serde_json::to_value(&other).unwrap_or(serde_json::Value::Null)),
        }
    }
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, ApplicationError>;

    async fn setting_or(
        &self,
        key: &str,
        default: SettingValue,
    ) -> Result<SettingValue, ApplicationError> {
        Ok(self.get_setting(key).await?.unwrap_or(default))
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySettings {
    values: HashMap<String, SettingValue>,
}

impl InMemorySettings {
    pub fn with(mut self, key: &str, value: SettingValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: SettingValue) {
        self.values.insert(normalize_setting_key(key), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, SettingValue)> for InMemorySettings {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        let values =
            iter.into_iter().map(|(key, value)| (normalize_setting_key(&key), value)).collect();
        Self { values }
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettings {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, ApplicationError> {
        Ok(self.values.get(&normalize_setting_key(key)).cloned())
    }
}

/// Reads from `primary` and falls back to `fallback` for keys the primary store lacks.
pub struct LayeredSettings<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> LayeredSettings<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P, F> SettingsProvider for LayeredSettings<P, F>
where
    P: SettingsProvider,
    F: SettingsProvider,
{
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, ApplicationError> {
        match self.primary.get_setting(key).await? {
            Some(value) => Ok(Some(value)),
            None => self.fallback.get_setting(key).await,
        }
    }
}

pub fn normalize_setting_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

/// Settings snapshot taken once per resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub max_requisition_amount: Decimal,
    pub allow_self_approval: bool,
    pub max_payment_without_cfo: Decimal,
    pub max_payment_without_ceo: Decimal,
    pub fast_track_enabled: bool,
    pub max_approvals_per_requisition: usize,
    pub track_workflow_metrics: bool,
    pub end_to_end_sla_days: i64,
    pub payment_sla_hours: i64,
    pub approval_email_notifications: bool,
    // Reserved for scheduling and parallel-approval semantics; read but not acted on.
    pub business_hours_only: bool,
    pub weekend_processing: bool,
    pub parallel_approval_enabled: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_requisition_amount: Decimal::new(1_000_000_000, 2),
            allow_self_approval: false,
            max_payment_without_cfo: Decimal::new(50_000_000, 2),
            max_payment_without_ceo: Decimal::new(100_000_000, 2),
            fast_track_enabled: true,
            max_approvals_per_requisition: 6,
            track_workflow_metrics: true,
            end_to_end_sla_days: 5,
            payment_sla_hours: 48,
            approval_email_notifications: true,
            business_hours_only: false,
            weekend_processing: true,
            parallel_approval_enabled: false,
        }
    }
}

impl WorkflowSettings {
    pub async fn load<P>(provider: &P) -> Result<Self, ApplicationError>
    where
        P: SettingsProvider + ?Sized,
    {
        let defaults = Self::default();
        let settings = Self {
            max_requisition_amount: read_decimal(
                provider,
                keys::MAX_REQUISITION_AMOUNT,
                defaults.max_requisition_amount,
            )
            .await?,
            allow_self_approval: read_bool(
                provider,
                keys::ALLOW_SELF_APPROVAL,
                defaults.allow_self_approval,
            )
            .await?,
            max_payment_without_cfo: read_decimal(
                provider,
                keys::MAX_PAYMENT_AMOUNT_WITHOUT_CFO,
                defaults.max_payment_without_cfo,
            )
            .await?,
            max_payment_without_ceo: read_decimal(
                provider,
                keys::MAX_PAYMENT_AMOUNT_WITHOUT_CEO,
                defaults.max_payment_without_ceo,
            )
            .await?,
            fast_track_enabled: read_bool(
                provider,
                keys::FAST_TRACK_ENABLED,
                defaults.fast_track_enabled,
            )
            .await?,
            max_approvals_per_requisition: read_count(
                provider,
                keys::MAX_APPROVALS_PER_REQUISITION,
                defaults.max_approvals_per_requisition,
            )
            .await?,
            track_workflow_metrics: read_bool(
                provider,
                keys::TRACK_WORKFLOW_METRICS,
                defaults.track_workflow_metrics,
            )
            .await?,
            end_to_end_sla_days: read_i64(
                provider,
                keys::END_TO_END_SLA_DAYS,
                defaults.end_to_end_sla_days,
            )
            .await?,
            payment_sla_hours: read_i64(
                provider,
                keys::PAYMENT_SLA_HOURS,
                defaults.payment_sla_hours,
            )
            .await?,
            approval_email_notifications: read_bool(
                provider,
                keys::APPROVAL_EMAIL_NOTIFICATIONS,
                defaults.approval_email_notifications,
            )
            .await?,
            business_hours_only: read_bool(
                provider,
                keys::BUSINESS_HOURS_ONLY,
                defaults.business_hours_only,
            )
            .await?,
            weekend_processing: read_bool(
                provider,
                keys::WEEKEND_PROCESSING,
                defaults.weekend_processing,
            )
            .await?,
            parallel_approval_enabled: read_bool(
                provider,
                keys::PARALLEL_APPROVAL_ENABLED,
                defaults.parallel_approval_enabled,
            )
            .await?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.max_approvals_per_requisition == 0 {
            return Err(ApplicationError::Configuration(format!(
                "{} must be at least 1",
                keys::MAX_APPROVALS_PER_REQUISITION
            )));
        }
        if self.end_to_end_sla_days < 0 || self.payment_sla_hours < 0 {
            return Err(ApplicationError::Configuration(format!(
                "{} and {} must not be negative",
                keys::END_TO_END_SLA_DAYS,
                keys::PAYMENT_SLA_HOURS
            )));
        }
        if self.max_payment_without_cfo.is_sign_negative()
            || self.max_payment_without_ceo.is_sign_negative()
        {
            return Err(ApplicationError::Configuration(format!(
                "{} and {} must not be negative",
                keys::MAX_PAYMENT_AMOUNT_WITHOUT_CFO,
                keys::MAX_PAYMENT_AMOUNT_WITHOUT_CEO
            )));
        }
        Ok(())
    }
}

fn mistyped(key: &str, expected: &str, value: &SettingValue) -> ApplicationError {
    ApplicationError::Configuration(format!(
        "setting `{key}` expects {expected}, found {} `{}`",
        value.type_name(),
        value.to_storage_string()
    ))
}

async fn read_bool<P>(provider: &P, key: &str, default: bool) -> Result<bool, ApplicationError>
where
    P: SettingsProvider + ?Sized,
{
    match provider.get_setting(key).await? {
        Some(value) => value.as_bool().ok_or_else(|| mistyped(key, "a boolean", &value)),
        None => Ok(default),
    }
}

async fn read_i64<P>(provider: &P, key: &str, default: i64) -> Result<i64, ApplicationError>
where
    P: SettingsProvider + ?Sized,
{
    match provider.get_setting(key).await? {
        Some(value) => value.as_i64().ok_or_else(|| mistyped(key, "an integer", &value)),
        None => Ok(default),
    }
}

async fn read_count<P>(provider: &P, key: &str, default: usize) -> Result<usize, ApplicationError>
where
    P: SettingsProvider + ?Sized,
{
    let value = read_i64(provider, key, default as i64).await?;
    usize::try_from(value).map_err(|_| {
        ApplicationError::Configuration(format!("setting `{key}` must not be negative"))
    })
}

async fn read_decimal<P>(
    provider: &P,
    key: &str,
    default: Decimal,
) -> Result<Decimal, ApplicationError>
where
    P: SettingsProvider + ?Sized,
{
    match provider.get_setting(key).await? {
        Some(value) => value.as_decimal().ok_or_else(|| mistyped(key, "an amount", &value)),
        None => Ok(default),
    }
}

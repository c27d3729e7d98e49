use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reqflow_core::errors::ApplicationError;
use reqflow_core::settings::{normalize_setting_key, SettingValue, SettingsProvider};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingValue>, RepositoryError> {
        let row = sqlx::query("SELECT value, value_type FROM system_setting WHERE key = ?")
            .bind(normalize_setting_key(key))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.try_get("value")?;
        let value_type: String = row.try_get("value_type")?;

        SettingValue::from_storage(&value_type, &value)
            .map(Some)
            .map_err(|error| RepositoryError::Decode(format!("system_setting `{key}`: {error}")))
    }

    pub async fn upsert(&self, key: &str, value: &SettingValue) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO system_setting (key, value, value_type, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 value_type = excluded.value_type,
                 updated_at = excluded.updated_at",
        )
        .bind(normalize_setting_key(key))
        .bind(value.to_storage_string())
        .bind(value.type_name())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every stored setting ordered by key. Rows that fail to decode are reported, not skipped.
    pub async fn list(&self) -> Result<Vec<(String, SettingValue)>, RepositoryError> {
        let rows = sqlx::query("SELECT key, value, value_type FROM system_setting ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(setting_from_row).collect()
    }
}

fn setting_from_row(row: &SqliteRow) -> Result<(String, SettingValue), RepositoryError> {
    let key: String = row.try_get("key")?;
    let value: String = row.try_get("value")?;
    let value_type: String = row.try_get("value_type")?;
    let decoded = SettingValue::from_storage(&value_type, &value)
        .map_err(|error| RepositoryError::Decode(format!("system_setting `{key}`: {error}")))?;
    Ok((key, decoded))
}

#[async_trait]
impl SettingsProvider for SqlSettingsRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, ApplicationError> {
        match self.get(key).await {
            Ok(value) => Ok(value),
            Err(RepositoryError::Decode(message)) => Err(ApplicationError::Configuration(message)),
            Err(error) => Err(error.into()),
        }
    }
}

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reqflow_core::domain::requisition::OriginType;
use reqflow_core::domain::threshold::{ApprovalThreshold, ThresholdId, ANY_ORIGIN};
use reqflow_core::errors::ApplicationError;
use reqflow_core::workflow::ports::ThresholdSource;

use super::{parse_decimal, RepositoryError};
use crate::DbPool;

const THRESHOLD_COLUMNS: &str = "id, name, min_amount, max_amount, roles_json, active, priority,
     origin_type, urgent_fast_track_allowed, requires_cfo";

pub struct SqlThresholdRepository {
    pool: DbPool,
}

impl SqlThresholdRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, threshold: &ApprovalThreshold) -> Result<(), RepositoryError> {
        let roles_json = serde_json::to_string(&threshold.roles)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO approval_threshold (id, name, min_amount, max_amount, roles_json, active,
                                             priority, origin_type, urgent_fast_track_allowed,
                                             requires_cfo)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 min_amount = excluded.min_amount,
                 max_amount = excluded.max_amount,
                 roles_json = excluded.roles_json,
                 active = excluded.active,
                 priority = excluded.priority,
                 origin_type = excluded.origin_type,
                 urgent_fast_track_allowed = excluded.urgent_fast_track_allowed,
                 requires_cfo = excluded.requires_cfo",
        )
        .bind(threshold.id.0)
        .bind(&threshold.name)
        .bind(threshold.min_amount.to_string())
        .bind(threshold.max_amount.to_string())
        .bind(roles_json)
        .bind(threshold.active)
        .bind(threshold.priority)
        .bind(&threshold.origin_type)
        .bind(threshold.urgent_fast_track_allowed)
        .bind(threshold.requires_cfo)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Active thresholds for `origin` (or all origins), ordered by `(priority, min_amount, id)`.
    /// Amounts are stored as text, so the amount ordering happens after decoding.
    pub async fn list_active(
        &self,
        origin: Option<OriginType>,
    ) -> Result<Vec<ApprovalThreshold>, RepositoryError> {
        let rows = match origin {
            Some(origin) => {
                sqlx::query(&format!(
                    "SELECT {THRESHOLD_COLUMNS} FROM approval_threshold
                     WHERE active = 1 AND UPPER(TRIM(origin_type)) IN (?, UPPER(?))
                     ORDER BY priority ASC, id ASC"
                ))
                .bind(ANY_ORIGIN)
                .bind(origin.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {THRESHOLD_COLUMNS} FROM approval_threshold
                     WHERE active = 1
                     ORDER BY priority ASC, id ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut thresholds =
            rows.iter().map(threshold_from_row).collect::<Result<Vec<_>, _>>()?;
        thresholds.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.min_amount.cmp(&right.min_amount))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(thresholds)
    }
}

fn threshold_from_row(row: &SqliteRow) -> Result<ApprovalThreshold, RepositoryError> {
    let roles_json: String = row.try_get("roles_json")?;
    let roles: Vec<String> = serde_json::from_str(&roles_json)
        .map_err(|error| RepositoryError::Decode(format!("roles_json `{roles_json}`: {error}")))?;
    let min_amount: String = row.try_get("min_amount")?;
    let max_amount: String = row.try_get("max_amount")?;

    Ok(ApprovalThreshold {
        id: ThresholdId(row.try_get("id")?),
        name: row.try_get("name")?,
        min_amount: parse_decimal("min_amount", &min_amount)?,
        max_amount: parse_decimal("max_amount", &max_amount)?,
        roles,
        active: row.try_get("active")?,
        priority: row.try_get("priority")?,
        origin_type: row.try_get("origin_type")?,
        urgent_fast_track_allowed: row.try_get("urgent_fast_track_allowed")?,
        requires_cfo: row.try_get("requires_cfo")?,
    })
}

#[async_trait]
impl ThresholdSource for SqlThresholdRepository {
    async fn active_thresholds(
        &self,
        origin: Option<OriginType>,
    ) -> Result<Vec<ApprovalThreshold>, ApplicationError> {
        Ok(self.list_active(origin).await?)
    }
}

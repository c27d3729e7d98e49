use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reqflow_core::domain::directory::{BranchId, CompanyId, DepartmentId, RegionId, UserId};
use reqflow_core::domain::requisition::{
    ApprovalStep, Requester, Requisition, RequisitionId, RequisitionStatus, SlaDeadlines,
};
use reqflow_core::domain::threshold::ThresholdId;
use reqflow_core::errors::ApplicationError;
use reqflow_core::workflow::ports::{
    CommitMode, CommitOutcome, RequisitionStore, ResolutionWrite,
};

use super::{parse_decimal, parse_timestamp, RepositoryError};
use crate::DbPool;

const REQUISITION_COLUMNS: &str = "id, requester_id, requester_role, origin_type, company_id,
     region_id, branch_id, department_id, amount, purpose, is_urgent, tier, applied_threshold_id,
     workflow_sequence_json, next_approver_id, status, end_to_end_due_at, payment_due_at,
     created_at, updated_at";

const RESOLVABLE_STATUSES: &str = "'draft', 'pending'";

pub struct SqlRequisitionRepository {
    pool: DbPool,
}

impl SqlRequisitionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn fetch(&self, id: &RequisitionId) -> Result<Option<Requisition>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUISITION_COLUMNS} FROM requisition WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(requisition_from_row).transpose()
    }

    pub async fn upsert(&self, requisition: &Requisition) -> Result<(), RepositoryError> {
        let sequence_json = encode_sequence(&requisition.workflow_sequence)?;

        sqlx::query(
            "INSERT INTO requisition (id, requester_id, requester_role, origin_type, company_id,
                                      region_id, branch_id, department_id, amount, purpose,
                                      is_urgent, tier, applied_threshold_id,
                                      workflow_sequence_json, next_approver_id, status,
                                      end_to_end_due_at, payment_due_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 requester_id = excluded.requester_id,
                 requester_role = excluded.requester_role,
                 origin_type = excluded.origin_type,
                 company_id = excluded.company_id,
                 region_id = excluded.region_id,
                 branch_id = excluded.branch_id,
                 department_id = excluded.department_id,
                 amount = excluded.amount,
                 purpose = excluded.purpose,
                 is_urgent = excluded.is_urgent,
                 tier = excluded.tier,
                 applied_threshold_id = excluded.applied_threshold_id,
                 workflow_sequence_json = excluded.workflow_sequence_json,
                 next_approver_id = excluded.next_approver_id,
                 status = excluded.status,
                 end_to_end_due_at = excluded.end_to_end_due_at,
                 payment_due_at = excluded.payment_due_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&requisition.id.0)
        .bind(requisition.requester.id.0)
        .bind(&requisition.requester.role)
        .bind(requisition.origin.as_str())
        .bind(requisition.company_id.map(|id| id.0))
        .bind(requisition.region_id.map(|id| id.0))
        .bind(requisition.branch_id.map(|id| id.0))
        .bind(requisition.department_id.map(|id| id.0))
        .bind(requisition.amount.to_string())
        .bind(&requisition.purpose)
        .bind(requisition.is_urgent)
        .bind(&requisition.tier)
        .bind(requisition.applied_threshold_id.map(|id| id.0))
        .bind(sequence_json)
        .bind(requisition.next_approver.map(|id| id.0))
        .bind(requisition.status.as_str())
        .bind(requisition.sla.end_to_end_due_at.map(|at| at.to_rfc3339()))
        .bind(requisition.sla.payment_due_at.map(|at| at.to_rfc3339()))
        .bind(requisition.created_at.to_rfc3339())
        .bind(requisition.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn ids_by_status(
        &self,
        status: RequisitionStatus,
        limit: u32,
    ) -> Result<Vec<RequisitionId>, RepositoryError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM requisition WHERE status = ? ORDER BY id ASC LIMIT ?",
        )
        .bind(status.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(RequisitionId).collect())
    }

    /// Writes every resolver-owned column in one transaction, and only while the row is
    /// still `draft` or `pending`. With [`CommitMode::IfUnresolved`] the update also
    /// requires that no threshold is applied. A row another writer has resolved or
    /// advanced in the meantime turns this call into [`CommitOutcome::Skipped`].
    pub async fn write_resolution(
        &self,
        id: &RequisitionId,
        write: &ResolutionWrite,
        mode: CommitMode,
    ) -> Result<CommitOutcome, RepositoryError> {
        let sequence_json = encode_sequence(&write.workflow_sequence)?;
        let guard = match mode {
            CommitMode::IfUnresolved => " AND applied_threshold_id IS NULL",
            CommitMode::Replace => "",
        };

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&format!(
            "UPDATE requisition
             SET applied_threshold_id = ?, tier = ?, workflow_sequence_json = ?,
                 next_approver_id = ?, status = ?, end_to_end_due_at = ?, payment_due_at = ?,
                 updated_at = ?
             WHERE id = ? AND status IN ({RESOLVABLE_STATUSES}){guard}"
        ))
        .bind(write.threshold_id.0)
        .bind(&write.tier)
        .bind(sequence_json)
        .bind(write.next_approver.0)
        .bind(write.status.as_str())
        .bind(write.sla.end_to_end_due_at.map(|at| at.to_rfc3339()))
        .bind(write.sla.payment_due_at.map(|at| at.to_rfc3339()))
        .bind(write.updated_at.to_rfc3339())
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM requisition WHERE id = ?)")
                    .bind(&id.0)
                    .fetch_one(&mut *tx)
                    .await?;
            if exists == 0 {
                return Err(RepositoryError::Decode(format!("requisition {} not found", id.0)));
            }
            return Ok(CommitOutcome::Skipped);
        }

        tx.commit().await?;
        Ok(CommitOutcome::Applied)
    }
}

fn encode_sequence(steps: &[ApprovalStep]) -> Result<String, RepositoryError> {
    serde_json::to_string(steps).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn requisition_from_row(row: &SqliteRow) -> Result<Requisition, RepositoryError> {
    let origin: String = row.try_get("origin_type")?;
    let status: String = row.try_get("status")?;
    let amount: String = row.try_get("amount")?;
    let sequence_json: String = row.try_get("workflow_sequence_json")?;
    let workflow_sequence: Vec<ApprovalStep> =
        serde_json::from_str(&sequence_json).map_err(|error| {
            RepositoryError::Decode(format!("workflow_sequence_json: {error}"))
        })?;
    let end_to_end_due_at: Option<String> = row.try_get("end_to_end_due_at")?;
    let payment_due_at: Option<String> = row.try_get("payment_due_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Requisition {
        id: RequisitionId(row.try_get("id")?),
        requester: Requester {
            id: UserId(row.try_get("requester_id")?),
            role: row.try_get("requester_role")?,
        },
        origin: origin.parse().map_err(|error| RepositoryError::Decode(format!("{error}")))?,
        company_id: row.try_get::<Option<i64>, _>("company_id")?.map(CompanyId),
        region_id: row.try_get::<Option<i64>, _>("region_id")?.map(RegionId),
        branch_id: row.try_get::<Option<i64>, _>("branch_id")?.map(BranchId),
        department_id: row.try_get::<Option<i64>, _>("department_id")?.map(DepartmentId),
        amount: parse_decimal("amount", &amount)?,
        purpose: row.try_get("purpose")?,
        is_urgent: row.try_get("is_urgent")?,
        tier: row.try_get("tier")?,
        applied_threshold_id: row
            .try_get::<Option<i64>, _>("applied_threshold_id")?
            .map(ThresholdId),
        workflow_sequence,
        next_approver: row.try_get::<Option<i64>, _>("next_approver_id")?.map(UserId),
        status: status.parse().map_err(|error| RepositoryError::Decode(format!("{error}")))?,
        sla: SlaDeadlines {
            end_to_end_due_at: end_to_end_due_at
                .as_deref()
                .map(|raw| parse_timestamp("end_to_end_due_at", raw))
                .transpose()?,
            payment_due_at: payment_due_at
                .as_deref()
                .map(|raw| parse_timestamp("payment_due_at", raw))
                .transpose()?,
        },
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl RequisitionStore for SqlRequisitionRepository {
    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, ApplicationError> {
        Ok(self.fetch(id).await?)
    }

    async fn save(&self, requisition: Requisition) -> Result<(), ApplicationError> {
        Ok(self.upsert(&requisition).await?)
    }

    async fn list_ids_by_status(
        &self,
        status: RequisitionStatus,
        limit: u32,
    ) -> Result<Vec<RequisitionId>, ApplicationError> {
        Ok(self.ids_by_status(status, limit).await?)
    }

    async fn commit_resolution(
        &self,
        id: &RequisitionId,
        write: &ResolutionWrite,
        mode: CommitMode,
    ) -> Result<CommitOutcome, ApplicationError> {
        Ok(self.write_resolution(id, write, mode).await?)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::directory::{CandidateQuery, DirectoryUser, UserId};
use crate::domain::requisition::{
    ApprovalStep, OriginType, Requisition, RequisitionId, RequisitionStatus, SlaDeadlines,
};
use crate::domain::threshold::{ApprovalThreshold, ThresholdId};
use crate::errors::ApplicationError;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Active users matching the query, ordered by ascending user id.
    async fn find_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DirectoryUser>, ApplicationError>;
}

#[async_trait]
pub trait ThresholdSource: Send + Sync {
    /// Active thresholds ordered by `(priority, min_amount)`. When `origin` is given only
    /// thresholds whose origin filter is `ANY` or that origin are returned.
    async fn active_thresholds(
        &self,
        origin: Option<OriginType>,
    ) -> Result<Vec<ApprovalThreshold>, ApplicationError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitMode {
    /// Write only if no threshold has been applied yet.
    IfUnresolved,
    /// Replace whatever resolution state is stored.
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// Another writer resolved or advanced the requisition first.
    Skipped,
}

/// Resolver-owned fields, written together or not at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionWrite {
    pub threshold_id: ThresholdId,
    pub tier: String,
    pub workflow_sequence: Vec<ApprovalStep>,
    pub next_approver: UserId,
    pub status: RequisitionStatus,
    pub sla: SlaDeadlines,
    pub updated_at: DateTime<Utc>,
}

impl ResolutionWrite {
    pub fn apply_to(&self, requisition: &mut Requisition) {
        requisition.applied_threshold_id = Some(self.threshold_id);
        requisition.tier = Some(self.tier.clone());
        requisition.workflow_sequence = self.workflow_sequence.clone();
        requisition.next_approver = Some(self.next_approver);
        requisition.status = self.status;
        requisition.sla = self.sla.clone();
        requisition.updated_at = self.updated_at;
    }
}

#[async_trait]
pub trait RequisitionStore: Send + Sync {
    async fn find_by_id(&self, id: &RequisitionId)
        -> Result<Option<Requisition>, ApplicationError>;

    async fn save(&self, requisition: Requisition) -> Result<(), ApplicationError>;

    async fn list_ids_by_status(
        &self,
        status: RequisitionStatus,
        limit: u32,
    ) -> Result<Vec<RequisitionId>, ApplicationError>;

    async fn commit_resolution(
        &self,
        id: &RequisitionId,
        write: &ResolutionWrite,
        mode: CommitMode,
    ) -> Result<CommitOutcome, ApplicationError>;
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::directory::{CandidateQuery, DirectoryUser};
use crate::domain::requisition::{OriginType, Requisition, RequisitionId, RequisitionStatus};
use crate::domain::threshold::ApprovalThreshold;
use crate::errors::ApplicationError;
use crate::workflow::ports::{
    CommitMode, CommitOutcome, RequisitionStore, ResolutionWrite, ThresholdSource, UserDirectory,
};

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<Vec<DirectoryUser>>,
}

impl InMemoryDirectory {
    pub fn with_users(users: Vec<DirectoryUser>) -> Self {
        Self { users: RwLock::new(users) }
    }

    pub async fn insert(&self, user: DirectoryUser) {
        let mut users = self.users.write().await;
        users.retain(|existing| existing.id != user.id);
        users.push(user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DirectoryUser>, ApplicationError> {
        let users = self.users.read().await;
        let mut matches: Vec<DirectoryUser> =
            users.iter().filter(|user| query.matches(user)).cloned().collect();
        matches.sort_by_key(|user| user.id);
        Ok(matches)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryThresholds {
    thresholds: RwLock<Vec<ApprovalThreshold>>,
}

impl InMemoryThresholds {
    pub fn with_thresholds(thresholds: Vec<ApprovalThreshold>) -> Self {
        Self { thresholds: RwLock::new(thresholds) }
    }

    pub async fn replace(&self, threshold: ApprovalThreshold) {
        let mut thresholds = self.thresholds.write().await;
        thresholds.retain(|existing| existing.id != threshold.id);
        thresholds.push(threshold);
    }
}

#[async_trait]
impl ThresholdSource for InMemoryThresholds {
    async fn active_thresholds(
        &self,
        origin: Option<OriginType>,
    ) -> Result<Vec<ApprovalThreshold>, ApplicationError> {
        let thresholds = self.thresholds.read().await;
        let mut active: Vec<ApprovalThreshold> = thresholds
            .iter()
            .filter(|threshold| threshold.active)
            .filter(|threshold| origin.map_or(true, |origin| threshold.applies_to_origin(origin)))
            .cloned()
            .collect();
        active.sort_by(|left, right| {
            left.priority.cmp(&right.priority).then_with(|| left.min_amount.cmp(&right.min_amount))
        });
        Ok(active)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRequisitionStore {
    requisitions: RwLock<HashMap<String, Requisition>>,
}

#[async_trait]
impl RequisitionStore for InMemoryRequisitionStore {
    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, ApplicationError> {
        let requisitions = self.requisitions.read().await;
        Ok(requisitions.get(&id.0).cloned())
    }

    async fn save(&self, requisition: Requisition) -> Result<(), ApplicationError> {
        let mut requisitions = self.requisitions.write().await;
        requisitions.insert(requisition.id.0.clone(), requisition);
        Ok(())
    }

    async fn list_ids_by_status(
        &self,
        status: RequisitionStatus,
        limit: u32,
    ) -> Result<Vec<RequisitionId>, ApplicationError> {
        let requisitions = self.requisitions.read().await;
        let mut ids: Vec<RequisitionId> = requisitions
            .values()
            .filter(|requisition| requisition.status == status)
            .map(|requisition| requisition.id.clone())
            .collect();
        ids.sort();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn commit_resolution(
        &self,
        id: &RequisitionId,
        write: &ResolutionWrite,
        mode: CommitMode,
    ) -> Result<CommitOutcome, ApplicationError> {
        let mut requisitions = self.requisitions.write().await;
        let Some(requisition) = requisitions.get_mut(&id.0) else {
            return Err(ApplicationError::Persistence(format!("requisition `{id}` does not exist")));
        };

        if !requisition.status.is_resolvable()
            || (mode == CommitMode::IfUnresolved && requisition.applied_threshold_id.is_some())
        {
            return Ok(CommitOutcome::Skipped);
        }

        write.apply_to(requisition);
        Ok(CommitOutcome::Applied)
    }
}

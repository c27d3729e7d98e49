use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::directory::UserId;
use crate::domain::requisition::RequisitionId;

pub const APPROVAL_NEEDED: &str = "approval_needed";

/// Sent to the first approver once a chain has been committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNeededEvent {
    pub requisition_id: RequisitionId,
    pub next_approver_id: UserId,
    pub amount: Decimal,
    pub purpose: String,
    pub tier: String,
    pub urgent: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Unavailable(String),
    #[error("notification rejected for requisition `{requisition_id}`: {reason}")]
    Rejected { requisition_id: RequisitionId, reason: String },
}

#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn approval_needed(&self, event: &ApprovalNeededEvent) -> Result<(), NotificationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ApprovalNotifier for NoopNotifier {
    async fn approval_needed(&self, _event: &ApprovalNeededEvent) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Emits the notification as a structured log line; used by the CLI where no mail
/// transport is wired.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ApprovalNotifier for LogNotifier {
    async fn approval_needed(&self, event: &ApprovalNeededEvent) -> Result<(), NotificationError> {
        info!(
            event_name = APPROVAL_NEEDED,
            requisition_id = %event.requisition_id,
            next_approver_id = %event.next_approver_id,
            amount = %event.amount,
            tier = %event.tier,
            urgent = event.urgent,
            "approval needed"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<ApprovalNeededEvent>>>,
    failure: Option<String>,
}

impl InMemoryNotifier {
    /// A notifier whose every send fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { sent: Arc::default(), failure: Some(reason.into()) }
    }

    pub fn sent(&self) -> Vec<ApprovalNeededEvent> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ApprovalNotifier for InMemoryNotifier {
    async fn approval_needed(&self, event: &ApprovalNeededEvent) -> Result<(), NotificationError> {
        if let Some(reason) = &self.failure {
            return Err(NotificationError::Unavailable(reason.clone()));
        }

        match self.sent.lock() {
            Ok(mut sent) => sent.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

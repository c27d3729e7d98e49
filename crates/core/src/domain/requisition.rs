use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::directory::{BranchId, CompanyId, DepartmentId, RegionId, UserId};
use crate::domain::threshold::ThresholdId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequisitionId(pub String);

impl fmt::Display for RequisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    Branch,
    Hq,
    Field,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Hq => "hq",
            Self::Field => "field",
        }
    }
}

impl fmt::Display for OriginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OriginType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "branch" => Ok(Self::Branch),
            "hq" => Ok(Self::Hq),
            "field" => Ok(Self::Field),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported origin type `{other}` (expected branch|hq|field)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionStatus {
    Draft,
    Pending,
    Reviewed,
    Paid,
    Rejected,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }

    /// Only draft and pending requisitions may have their approval chain (re)computed.
    pub fn is_resolvable(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending)
    }
}

impl std::str::FromStr for RequisitionStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "reviewed" => Ok(Self::Reviewed),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown requisition status `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub role: String,
    pub approver_id: UserId,
    pub auto_escalated: bool,
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub parallel_approved: bool,
}

impl ApprovalStep {
    pub fn direct(role: impl Into<String>, approver_id: UserId) -> Self {
        Self {
            role: role.into(),
            approver_id,
            auto_escalated: false,
            escalation_reason: None,
            parallel_approved: false,
        }
    }

    pub fn escalated(
        role: impl Into<String>,
        approver_id: UserId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            approver_id,
            auto_escalated: true,
            escalation_reason: Some(reason.into()),
            parallel_approved: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaDeadlines {
    pub end_to_end_due_at: Option<DateTime<Utc>>,
    pub payment_due_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBreaches {
    pub end_to_end: bool,
    pub payment: bool,
}

impl SlaBreaches {
    pub fn any(&self) -> bool {
        self.end_to_end || self.payment
    }
}

impl SlaDeadlines {
    pub fn is_assigned(&self) -> bool {
        self.end_to_end_due_at.is_some() || self.payment_due_at.is_some()
    }

    pub fn breaches(&self, now: DateTime<Utc>) -> SlaBreaches {
        SlaBreaches {
            end_to_end: self.end_to_end_due_at.is_some_and(|due| now > due),
            payment: self.payment_due_at.is_some_and(|due| now > due),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: RequisitionId,
    pub requester: Requester,
    pub origin: OriginType,
    pub company_id: Option<CompanyId>,
    pub region_id: Option<RegionId>,
    pub branch_id: Option<BranchId>,
    pub department_id: Option<DepartmentId>,
    pub amount: Decimal,
    pub purpose: String,
    pub is_urgent: bool,
    pub tier: Option<String>,
    pub applied_threshold_id: Option<ThresholdId>,
    pub workflow_sequence: Vec<ApprovalStep>,
    pub next_approver: Option<UserId>,
    pub status: RequisitionStatus,
    pub sla: SlaDeadlines,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisition {
    /// A requisition counts as resolved once a threshold has been applied and a chain persisted.
    pub fn is_resolved(&self) -> bool {
        self.applied_threshold_id.is_some() && !self.workflow_sequence.is_empty()
    }

    /// Copy with every resolver-owned field cleared, used by the forced re-resolution path.
    /// SLA deadlines survive so repeated repairs never move them.
    pub fn cleared_for_reresolution(&self) -> Self {
        Self {
            tier: None,
            applied_threshold_id: None,
            workflow_sequence: Vec::new(),
            next_approver: None,
            ..self.clone()
        }
    }

    pub fn can_transition_to(&self, next: RequisitionStatus) -> bool {
        matches!(
            (self.status, next),
            (RequisitionStatus::Draft, RequisitionStatus::Pending)
                | (RequisitionStatus::Pending, RequisitionStatus::Pending)
                | (RequisitionStatus::Pending, RequisitionStatus::Reviewed)
                | (RequisitionStatus::Pending, RequisitionStatus::Rejected)
                | (RequisitionStatus::Reviewed, RequisitionStatus::Paid)
                | (RequisitionStatus::Reviewed, RequisitionStatus::Rejected)
        )
    }

    pub fn check_pending_invariant(&self) -> Result<(), DomainError> {
        if self.status != RequisitionStatus::Pending {
            return Ok(());
        }

        let Some(first) = self.workflow_sequence.first() else {
            return Err(DomainError::InvariantViolation(format!(
                "pending requisition `{}` has an empty workflow sequence",
                self.id
            )));
        };

        if self.next_approver != Some(first.approver_id) {
            return Err(DomainError::InvariantViolation(format!(
                "pending requisition `{}` next approver does not match first workflow step",
                self.id
            )));
        }

        Ok(())
    }
}

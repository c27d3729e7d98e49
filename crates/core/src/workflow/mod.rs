//! Approval-workflow resolution.
//!
//! A requisition is routed through: threshold match, role-chain construction,
//! per-role candidate lookup, urgent fast-track, escalation of gaps, truncation and
//! SLA assignment. [`resolver::WorkflowResolver`] runs those stages without writing
//! anything; [`service::ResolutionService`] adds locking, idempotency, persistence,
//! audit and notification around it.

pub mod candidates;
pub mod chain;
pub mod escalation;
pub mod locks;
pub mod memory;
pub mod ports;
pub mod resolver;
pub mod roles;
pub mod service;
pub mod sla;
pub mod thresholds;

#[cfg(test)]
pub(crate) mod testing;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::directory::UserId;
use crate::domain::requisition::{
    ApprovalStep, OriginType, RequisitionId, RequisitionStatus, SlaDeadlines,
};
use crate::domain::threshold::ThresholdId;
use crate::errors::{ApplicationError, DomainError, InterfaceError};

pub use resolver::WorkflowResolver;
pub use roles::RoleChainTrace;
pub use service::{BatchItem, ResolutionOutcome, ResolutionService, ResolveMode};

pub const TREASURY: &str = "treasury";
pub const STAFF: &str = "staff";
pub const ADMIN: &str = "admin";
pub const DEPARTMENT_HEAD: &str = "department_head";
pub const GROUP_FINANCE_MANAGER: &str = "group_finance_manager";
pub const CFO: &str = "cfo";
pub const CEO: &str = "ceo";

/// Roles whose holders serve the whole organization and are never scope-filtered.
pub const CENTRALIZED_ROLES: &[&str] =
    &[TREASURY, "fp&a", GROUP_FINANCE_MANAGER, CFO, CEO, ADMIN];

pub fn normalize_role(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

pub fn same_role(left: &str, right: &str) -> bool {
    normalize_role(left) == normalize_role(right)
}

pub fn is_centralized(role: &str) -> bool {
    let role = normalize_role(role);
    CENTRALIZED_ROLES.iter().any(|centralized| *centralized == role)
}

/// Result of one resolution run, ready to be persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChain {
    pub threshold_id: ThresholdId,
    pub tier: String,
    pub role_trace: RoleChainTrace,
    pub steps: Vec<ApprovalStep>,
    pub next_approver: UserId,
    pub fast_tracked: bool,
    pub truncated: bool,
    pub escalated_steps: usize,
    pub collapsed_to_admin: bool,
    pub sla: SlaDeadlines,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionErrorClass {
    Configuration,
    Validation,
    NotFound,
    Persistence,
}

impl ResolutionErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Persistence => "persistence",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error(
        "no approval threshold found for requisition `{requisition_id}`: no active threshold covers amount {amount} for origin `{origin}`"
    )]
    NoThresholdFound { requisition_id: RequisitionId, amount: Decimal, origin: OriginType },
    #[error(
        "no active admin account available to escalate requisition `{requisition_id}` (unresolved roles: {})",
        .unresolved_roles.join(", ")
    )]
    NoAdminAvailable { requisition_id: RequisitionId, unresolved_roles: Vec<String> },
    #[error(
        "requisition `{requisition_id}` amount {amount} exceeds the configured maximum of {maximum}"
    )]
    AmountExceedsMaximum { requisition_id: RequisitionId, amount: Decimal, maximum: Decimal },
    #[error("requisition `{requisition_id}` amount {amount} must be greater than zero")]
    NonPositiveAmount { requisition_id: RequisitionId, amount: Decimal },
    #[error("requisition `{requisition_id}` is {} and can no longer be routed", .status.as_str())]
    NotResolvable { requisition_id: RequisitionId, status: RequisitionStatus },
    #[error("requisition `{0}` was not found")]
    RequisitionNotFound(RequisitionId),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl From<DomainError> for ResolutionError {
    fn from(value: DomainError) -> Self {
        Self::Application(ApplicationError::Domain(value))
    }
}

impl ResolutionError {
    pub fn class(&self) -> ResolutionErrorClass {
        match self {
            Self::NoThresholdFound { .. } | Self::NoAdminAvailable { .. } => {
                ResolutionErrorClass::Configuration
            }
            Self::AmountExceedsMaximum { .. }
            | Self::NonPositiveAmount { .. }
            | Self::NotResolvable { .. } => ResolutionErrorClass::Validation,
            Self::RequisitionNotFound(_) => ResolutionErrorClass::NotFound,
            Self::Application(ApplicationError::Configuration(_)) => {
                ResolutionErrorClass::Configuration
            }
            Self::Application(ApplicationError::Domain(_)) => ResolutionErrorClass::Validation,
            Self::Application(_) => ResolutionErrorClass::Persistence,
        }
    }

    /// Configuration and validation failures need an operator; only storage faults are worth
    /// retrying.
    pub fn is_retryable(&self) -> bool {
        self.class() == ResolutionErrorClass::Persistence
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self.class() {
            ResolutionErrorClass::Configuration => {
                InterfaceError::Misconfigured { message, correlation_id }
            }
            ResolutionErrorClass::Validation | ResolutionErrorClass::NotFound => {
                InterfaceError::Rejected { message, correlation_id }
            }
            ResolutionErrorClass::Persistence => {
                InterfaceError::StoreUnavailable { message, correlation_id }
            }
        }
    }
}

use thiserror::Error;

use crate::domain::requisition::RequisitionStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("requisition cannot move from {} to {}", .from.as_str(), .to.as_str())]
    InvalidRequisitionTransition { from: RequisitionStatus, to: RequisitionStatus },
    #[error("requisition invariant violated: {0}")]
    InvariantViolation(String),
}

/// Failures raised by ports and adapters underneath the resolver.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("requisition store failure: {0}")]
    Persistence(String),
    #[error("workflow configuration failure: {0}")]
    Configuration(String),
}

/// What an operator-facing surface reports. The message is the full diagnostic; the
/// hint is safe to show to someone who cannot read logs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("requisition rejected: {message}")]
    Rejected { message: String, correlation_id: String },
    #[error("requisition store unavailable: {message}")]
    StoreUnavailable { message: String, correlation_id: String },
    #[error("approval routing misconfigured: {message}")]
    Misconfigured { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn operator_hint(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => {
                "Fix the requisition amount, status or id and resolve it again."
            }
            Self::StoreUnavailable { .. } => "The database could not be reached. Retry shortly.",
            Self::Misconfigured { .. } => {
                "Check approval thresholds and make sure an active admin account exists."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Rejected { correlation_id, .. }
            | Self::StoreUnavailable { correlation_id, .. }
            | Self::Misconfigured { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(error) => {
                InterfaceError::Rejected { message: error.to_string(), correlation_id }
            }
            Self::Persistence(message) => {
                InterfaceError::StoreUnavailable { message, correlation_id }
            }
            Self::Configuration(message) => {
                InterfaceError::Misconfigured { message, correlation_id }
            }
        }
    }
}

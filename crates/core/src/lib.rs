pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notifications;
pub mod settings;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::directory::{DirectoryUser, UserId};
pub use domain::requisition::{
    ApprovalStep, OriginType, Requisition, RequisitionId, RequisitionStatus, SlaDeadlines,
};
pub use domain::threshold::{ApprovalThreshold, ThresholdId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notifications::{ApprovalNeededEvent, ApprovalNotifier, LogNotifier, NoopNotifier};
pub use settings::{SettingValue, SettingsProvider, WorkflowSettings};
pub use workflow::{
    BatchItem, ResolutionError, ResolutionOutcome, ResolutionService, ResolveMode, ResolvedChain,
    WorkflowResolver,
};

use tracing::debug;

use crate::domain::directory::{CandidateQuery, ScopeFilter, UserId};
use crate::domain::requisition::{OriginType, Requisition};
use crate::errors::ApplicationError;
use crate::workflow::ports::UserDirectory;
use crate::workflow::{is_centralized, same_role, ADMIN, STAFF};

/// One role in the chain and the user found for it, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingStep {
    pub role: String,
    pub candidate: Option<UserId>,
}

impl PendingStep {
    pub fn is_resolved(&self) -> bool {
        self.candidate.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateScope {
    Unscoped,
    Scoped(ScopeFilter),
    /// The role needs a scope the requisition does not carry, so nobody qualifies.
    Unavailable,
}

pub fn scope_for(role: &str, requisition: &Requisition) -> CandidateScope {
    if is_centralized(role) {
        return CandidateScope::Unscoped;
    }

    let scope = match requisition.origin {
        OriginType::Branch => requisition.branch_id.map(ScopeFilter::Branch),
        OriginType::Hq => requisition.company_id.map(ScopeFilter::Company),
        OriginType::Field => requisition.region_id.map(ScopeFilter::Region),
    };

    scope.map_or(CandidateScope::Unavailable, CandidateScope::Scoped)
}

pub struct CandidateResolver<'a> {
    directory: &'a dyn UserDirectory,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(directory: &'a dyn UserDirectory) -> Self {
        Self { directory }
    }

    /// Lowest-id active holder of `role` in scope, never the requester.
    pub async fn resolve_role(
        &self,
        role: &str,
        requisition: &Requisition,
    ) -> Result<Option<UserId>, ApplicationError> {
        let scope = match scope_for(role, requisition) {
            CandidateScope::Unscoped => None,
            CandidateScope::Scoped(scope) => Some(scope),
            CandidateScope::Unavailable => {
                debug!(
                    event_name = "workflow.candidates.scope_missing",
                    requisition_id = %requisition.id,
                    role,
                    origin = requisition.origin.as_str(),
                    "requisition lacks the scope needed to look up this role"
                );
                return Ok(None);
            }
        };

        let query =
            CandidateQuery::for_role(role).excluding(requisition.requester.id).scoped(scope);
        let candidates = self.directory.find_candidates(&query).await?;
        Ok(candidates.iter().map(|user| user.id).min())
    }

    /// Resolves every role in order; `staff` is dropped from the chain entirely.
    pub async fn resolve_roles(
        &self,
        roles: &[String],
        requisition: &Requisition,
    ) -> Result<Vec<PendingStep>, ApplicationError> {
        let mut steps = Vec::with_capacity(roles.len());
        for role in roles.iter().filter(|role| !same_role(role, STAFF)) {
            let candidate = self.resolve_role(role, requisition).await?;
            steps.push(PendingStep { role: role.clone(), candidate });
        }
        Ok(steps)
    }

    /// Escalation fallback: the lowest-id active admin, optionally excluding one user.
    pub async fn find_admin(
        &self,
        exclude: Option<UserId>,
    ) -> Result<Option<UserId>, ApplicationError> {
        let mut query = CandidateQuery::for_role(ADMIN);
        query.exclude_user = exclude;
        let admins = self.directory.find_candidates(&query).await?;
        Ok(admins.iter().map(|user| user.id).min())
    }
}

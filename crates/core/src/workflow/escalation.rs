use thiserror::Error;

use crate::domain::directory::UserId;
use crate::domain::requisition::ApprovalStep;
use crate::workflow::candidates::PendingStep;
use crate::workflow::ADMIN;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationOutcome {
    pub steps: Vec<ApprovalStep>,
    pub escalated_steps: usize,
    pub collapsed_to_admin: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no admin fallback for unresolved roles: {}", .unresolved_roles.join(", "))]
pub struct AdminFallbackMissing {
    pub unresolved_roles: Vec<String>,
}

/// True when escalation would have to fall back to an admin: the chain is empty, or some
/// unresolved step has no resolved step after it.
pub fn needs_admin_fallback(steps: &[PendingStep]) -> bool {
    if steps.is_empty() {
        return true;
    }

    let mut later_resolved = false;
    for step in steps.iter().rev() {
        if step.is_resolved() {
            later_resolved = true;
        } else if !later_resolved {
            return true;
        }
    }
    false
}

/// Fills every unresolved step with the candidate of the next resolved step further down
/// the chain, or with `admin` when none follows. When nothing in the chain resolved, the
/// chain collapses to a single admin step.
pub fn escalate(
    steps: &[PendingStep],
    admin: Option<UserId>,
) -> Result<EscalationOutcome, AdminFallbackMissing> {
    let unresolved_roles: Vec<String> =
        steps.iter().filter(|step| !step.is_resolved()).map(|step| step.role.clone()).collect();

    if steps.iter().all(|step| !step.is_resolved()) {
        let Some(admin) = admin else {
            return Err(AdminFallbackMissing { unresolved_roles });
        };
        let reason = if unresolved_roles.is_empty() {
            "No approval roles remained for this requisition; escalated to admin".to_string()
        } else {
            format!(
                "No eligible approvers for roles [{}]; escalated to admin",
                unresolved_roles.join(", ")
            )
        };
        return Ok(EscalationOutcome {
            steps: vec![ApprovalStep::escalated(ADMIN, admin, reason)],
            escalated_steps: 1,
            collapsed_to_admin: true,
        });
    }

    let mut resolved = Vec::with_capacity(steps.len());
    let mut escalated_steps = 0;

    for (index, step) in steps.iter().enumerate() {
        if let Some(candidate) = step.candidate {
            resolved.push(ApprovalStep::direct(step.role.clone(), candidate));
            continue;
        }

        let forward = steps[index + 1..]
            .iter()
            .find_map(|later| later.candidate.map(|candidate| (later.role.as_str(), candidate)));

        let (target_role, target) = match forward {
            Some(found) => found,
            None => match admin {
                Some(admin) => (ADMIN, admin),
                None => return Err(AdminFallbackMissing { unresolved_roles }),
            },
        };

        resolved.push(ApprovalStep::escalated(
            step.role.clone(),
            target,
            format!("No eligible {} found; escalated to {}", step.role, target_role),
        ));
        escalated_steps += 1;
    }

    Ok(EscalationOutcome { steps: resolved, escalated_steps, collapsed_to_admin: false })
}

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::requisition::Requisition;
use crate::errors::DomainError;
use crate::settings::WorkflowSettings;
use crate::workflow::candidates::CandidateResolver;
use crate::workflow::chain::{fast_track, truncate, FastTrackInput};
use crate::workflow::escalation::{escalate, needs_admin_fallback};
use crate::workflow::ports::{ThresholdSource, UserDirectory};
use crate::workflow::roles::{build_role_chain, RoleChainInput};
use crate::workflow::sla::assign_sla;
use crate::workflow::thresholds::ThresholdTable;
use crate::workflow::{ResolutionError, ResolvedChain};

/// Computes an approval chain for a requisition. Reads only; persisting the result is the
/// caller's job, which keeps this callable from batch repair tooling.
#[derive(Clone)]
pub struct WorkflowResolver {
    directory: Arc<dyn UserDirectory>,
    thresholds: Arc<dyn ThresholdSource>,
}

impl WorkflowResolver {
    pub fn new(directory: Arc<dyn UserDirectory>, thresholds: Arc<dyn ThresholdSource>) -> Self {
        Self { directory, thresholds }
    }

    pub async fn resolve(
        &self,
        requisition: &Requisition,
        settings: &WorkflowSettings,
    ) -> Result<ResolvedChain, ResolutionError> {
        validate_amount(requisition, settings)?;

        let table =
            ThresholdTable::new(self.thresholds.active_thresholds(Some(requisition.origin)).await?);
        let threshold = table.matching(requisition.amount, requisition.origin).ok_or_else(|| {
            ResolutionError::NoThresholdFound {
                requisition_id: requisition.id.clone(),
                amount: requisition.amount,
                origin: requisition.origin,
            }
        })?;

        let role_trace = build_role_chain(RoleChainInput {
            threshold_roles: &threshold.roles,
            requires_cfo: threshold.requires_cfo,
            tier: &threshold.name,
            requester_role: &requisition.requester.role,
            amount: requisition.amount,
            settings,
        });
        debug!(
            event_name = "workflow.resolver.roles_built",
            requisition_id = %requisition.id,
            threshold_id = %threshold.id,
            roles = ?role_trace.roles(),
            "role chain built"
        );

        let candidates = CandidateResolver::new(self.directory.as_ref());
        let pending = candidates.resolve_roles(role_trace.roles(), requisition).await?;

        let (pending, fast_tracked) = fast_track(
            pending,
            FastTrackInput {
                is_urgent: requisition.is_urgent,
                fast_track_enabled: settings.fast_track_enabled,
                threshold_allows: threshold.urgent_fast_track_allowed,
                tier: &threshold.name,
            },
        );

        let admin = if needs_admin_fallback(&pending) {
            let exclude = (!settings.allow_self_approval).then_some(requisition.requester.id);
            candidates.find_admin(exclude).await?
        } else {
            None
        };

        let escalation = escalate(&pending, admin).map_err(|missing| {
            ResolutionError::NoAdminAvailable {
                requisition_id: requisition.id.clone(),
                unresolved_roles: missing.unresolved_roles,
            }
        })?;

        let (steps, truncated) = truncate(escalation.steps, settings.max_approvals_per_requisition);
        let next_approver = steps.first().map(|step| step.approver_id).ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "requisition `{}` resolved to an empty approval chain",
                requisition.id
            ))
        })?;
        let sla = assign_sla(&requisition.sla, requisition.created_at, settings)?;

        info!(
            event_name = "workflow.resolver.resolved",
            requisition_id = %requisition.id,
            tier = %threshold.name,
            steps = steps.len(),
            next_approver = %next_approver,
            escalated_steps = escalation.escalated_steps,
            collapsed_to_admin = escalation.collapsed_to_admin,
            fast_tracked,
            truncated,
            "approval chain resolved"
        );

        Ok(ResolvedChain {
            threshold_id: threshold.id,
            tier: threshold.name.clone(),
            role_trace,
            steps,
            next_approver,
            fast_tracked,
            truncated,
            escalated_steps: escalation.escalated_steps,
            collapsed_to_admin: escalation.collapsed_to_admin,
            sla,
        })
    }
}

fn validate_amount(
    requisition: &Requisition,
    settings: &WorkflowSettings,
) -> Result<(), ResolutionError> {
    if requisition.amount <= Decimal::ZERO {
        return Err(ResolutionError::NonPositiveAmount {
            requisition_id: requisition.id.clone(),
            amount: requisition.amount,
        });
    }

    if requisition.amount > settings.max_requisition_amount {
        return Err(ResolutionError::AmountExceedsMaximum {
            requisition_id: requisition.id.clone(),
            amount: requisition.amount,
            maximum: settings.max_requisition_amount,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::domain::directory::UserId;
    use crate::domain::requisition::OriginType;
    use crate::domain::threshold::ThresholdId;
    use crate::workflow::testing::{
        directory_without, org_directory, requisition, resolver, settings, standard_thresholds,
        threshold, ADMIN_ID, BRANCH_MANAGER_ID, CEO_ID, CFO_ID, DEPARTMENT_HEAD_ID, GFM_ID,
        REQUESTER_ID, TREASURY_ID,
    };
    use crate::workflow::{ResolutionError, ResolutionErrorClass};

    #[tokio::test]
    async fn branch_requisition_with_scoped_candidates_resolves_two_steps() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let requisition = requisition("REQ-A", 15_000);

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        assert_eq!(chain.tier, "Tier 2");
        assert_eq!(chain.steps.len(), 2);
        assert_eq!(chain.steps[0].role, "branch_manager");
        assert_eq!(chain.steps[0].approver_id, UserId(BRANCH_MANAGER_ID));
        assert_eq!(chain.steps[1].approver_id, UserId(DEPARTMENT_HEAD_ID));
        assert!(chain.steps.iter().all(|step| !step.auto_escalated));
        assert_eq!(chain.next_approver, UserId(BRANCH_MANAGER_ID));
        assert_eq!(chain.escalated_steps, 0);
    }

    #[tokio::test]
    async fn missing_department_head_escalates_to_admin() {
        let resolver =
            resolver(directory_without(&[DEPARTMENT_HEAD_ID]), standard_thresholds());
        let requisition = requisition("REQ-B", 15_000);

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        assert_eq!(chain.steps.len(), 2);
        let escalated = &chain.steps[1];
        assert_eq!(escalated.role, "department_head");
        assert_eq!(escalated.approver_id, UserId(ADMIN_ID));
        assert!(escalated.auto_escalated);
        assert!(escalated
            .escalation_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("department_head") && reason.contains("admin")));
    }

    #[tokio::test]
    async fn missing_department_head_escalates_forward_to_later_role() {
        let thresholds = vec![threshold(
            2,
            "Tier 2",
            10_000,
            50_000,
            1,
            &["branch_manager", "department_head", "group_finance_manager"],
        )];
        let resolver = resolver(directory_without(&[DEPARTMENT_HEAD_ID]), thresholds);

        let chain =
            resolver.resolve(&requisition("REQ-B2", 15_000), &settings()).await.expect("resolve");

        assert_eq!(chain.steps[1].approver_id, UserId(GFM_ID));
        assert_eq!(
            chain.steps[1].escalation_reason.as_deref(),
            Some("No eligible department_head found; escalated to group_finance_manager")
        );
    }

    #[tokio::test]
    async fn treasury_requester_gets_tier_override_chain() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let mut requisition = requisition("REQ-C", 15_000);
        requisition.requester.id = UserId(TREASURY_ID);
        requisition.requester.role = "treasury".to_string();

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        let roles: Vec<&str> = chain.steps.iter().map(|step| step.role.as_str()).collect();
        assert_eq!(roles, vec!["group_finance_manager", "cfo"]);
        assert_eq!(chain.role_trace.roles(), ["group_finance_manager", "cfo"]);
        assert_eq!(chain.steps[1].approver_id, UserId(CFO_ID));
    }

    #[tokio::test]
    async fn urgent_tier_two_fast_tracks_to_last_step() {
        let thresholds = vec![threshold(
            2,
            "Tier 2",
            10_000,
            50_000,
            1,
            &["branch_manager", "department_head", "group_finance_manager"],
        )];
        let resolver = resolver(org_directory(), thresholds);
        let mut requisition = requisition("REQ-D", 15_000);
        requisition.is_urgent = true;

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        assert!(chain.fast_tracked);
        assert_eq!(chain.steps.len(), 1);
        assert_eq!(chain.steps[0].role, "group_finance_manager");
        assert_eq!(chain.next_approver, UserId(GFM_ID));
    }

    #[tokio::test]
    async fn urgent_top_tier_keeps_full_chain() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let mut requisition = requisition("REQ-D4", 300_000);
        requisition.is_urgent = true;

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        assert_eq!(chain.tier, "Tier 4");
        assert!(!chain.fast_tracked);
        assert!(chain.steps.len() > 1);
    }

    #[tokio::test]
    async fn amount_above_ceo_ceiling_appends_ceo() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let requisition = requisition("REQ-E", 2_000_000);

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        let last = chain.steps.last().expect("steps");
        assert_eq!(last.role, "ceo");
        assert_eq!(last.approver_id, UserId(CEO_ID));
        assert!(!chain.role_trace.raw.iter().any(|role| role == "ceo"));
    }

    #[tokio::test]
    async fn requester_never_approves_their_own_requisition() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let mut requisition = requisition("REQ-SELF", 15_000);
        requisition.requester.id = UserId(BRANCH_MANAGER_ID);
        requisition.requester.role = "branch_manager".to_string();

        let chain = resolver.resolve(&requisition, &settings()).await.expect("resolve");

        assert!(chain.steps.iter().all(|step| step.approver_id != UserId(BRANCH_MANAGER_ID)));
        assert_eq!(chain.steps[0].role, "department_head");
    }

    #[tokio::test]
    async fn no_candidates_anywhere_collapses_to_admin() {
        let resolver = resolver(
            directory_without(&[BRANCH_MANAGER_ID, DEPARTMENT_HEAD_ID]),
            standard_thresholds(),
        );

        let chain =
            resolver.resolve(&requisition("REQ-ADM", 15_000), &settings()).await.expect("resolve");

        assert!(chain.collapsed_to_admin);
        assert_eq!(chain.steps.len(), 1);
        assert_eq!(chain.steps[0].approver_id, UserId(ADMIN_ID));
        assert!(chain.steps[0].auto_escalated);
        assert_eq!(chain.next_approver, UserId(ADMIN_ID));
    }

    #[tokio::test]
    async fn missing_admin_is_a_configuration_error() {
        let resolver = resolver(
            directory_without(&[DEPARTMENT_HEAD_ID, ADMIN_ID]),
            standard_thresholds(),
        );

        let error = resolver
            .resolve(&requisition("REQ-NOADM", 15_000), &settings())
            .await
            .expect_err("must fail");

        assert!(matches!(
            error,
            ResolutionError::NoAdminAvailable { ref unresolved_roles, .. }
                if unresolved_roles == &vec!["department_head".to_string()]
        ));
    }

    #[tokio::test]
    async fn amount_outside_thresholds_is_reported() {
        let thresholds = vec![threshold(1, "Tier 1", 0, 10_000, 1, &["branch_manager"])];
        let resolver = resolver(org_directory(), thresholds);

        let error = resolver
            .resolve(&requisition("REQ-GAP", 15_000), &settings())
            .await
            .expect_err("must fail");

        assert!(matches!(
            error,
            ResolutionError::NoThresholdFound { origin: OriginType::Branch, .. }
        ));
    }

    #[tokio::test]
    async fn amount_above_system_maximum_is_a_validation_error() {
        let resolver = resolver(org_directory(), standard_thresholds());

        let error = resolver
            .resolve(&requisition("REQ-MAX", 20_000_000), &settings())
            .await
            .expect_err("must fail");

        assert!(matches!(error, ResolutionError::AmountExceedsMaximum { .. }));
    }

    #[tokio::test]
    async fn overlapping_thresholds_pick_lowest_priority_match() {
        let thresholds = vec![
            threshold(7, "Tier 2", 10_000, 50_000, 2, &["department_head"]),
            threshold(8, "Tier 2", 12_000, 20_000, 1, &["branch_manager"]),
        ];
        let resolver = resolver(org_directory(), thresholds);

        let chain =
            resolver.resolve(&requisition("REQ-OVL", 15_000), &settings()).await.expect("resolve");

        assert_eq!(chain.threshold_id, ThresholdId(8));
        assert_eq!(chain.steps[0].role, "branch_manager");
    }

    #[tokio::test]
    async fn chain_is_truncated_to_configured_maximum() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let mut settings = settings();
        settings.max_approvals_per_requisition = 2;

        let chain =
            resolver.resolve(&requisition("REQ-TRN", 2_000_000), &settings).await.expect("resolve");

        assert!(chain.truncated);
        assert_eq!(chain.steps.len(), 2);
        assert_eq!(chain.next_approver, chain.steps[0].approver_id);
    }

    #[tokio::test]
    async fn resolving_twice_yields_the_same_chain() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let requisition = requisition("REQ-IDEM", 75_000);

        let first = resolver.resolve(&requisition, &settings()).await.expect("first");
        let second = resolver.resolve(&requisition, &settings()).await.expect("second");

        assert_eq!(first, second);
        assert!(first.steps.iter().all(|step| step.approver_id != UserId(REQUESTER_ID)));
    }

    #[tokio::test]
    async fn oversized_sla_setting_fails_as_configuration() {
        let resolver = resolver(org_directory(), standard_thresholds());
        let mut settings = settings();
        settings.end_to_end_sla_days = 100_000_000;

        let error = resolver
            .resolve(&requisition("REQ-SLA", 15_000), &settings)
            .await
            .expect_err("deadline overflows");

        assert_eq!(error.class(), ResolutionErrorClass::Configuration);
        assert!(error.to_string().contains("END_TO_END_SLA_DAYS"));
    }
}

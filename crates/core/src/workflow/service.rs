use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink};
use crate::domain::requisition::{Requisition, RequisitionId, RequisitionStatus};
use crate::errors::DomainError;
use crate::notifications::{ApprovalNeededEvent, ApprovalNotifier, NoopNotifier};
use crate::settings::{SettingsProvider, WorkflowSettings};
use crate::workflow::locks::RequisitionLocks;
use crate::workflow::ports::{CommitMode, CommitOutcome, RequisitionStore, ResolutionWrite};
use crate::workflow::{ResolutionError, ResolvedChain, WorkflowResolver};

const DEFAULT_ACTOR: &str = "reqflow";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Leave an already-resolved requisition untouched.
    IfUnresolved,
    /// Recompute and replace whatever chain is stored.
    Force,
}

impl ResolveMode {
    fn commit_mode(self) -> CommitMode {
        match self {
            Self::IfUnresolved => CommitMode::IfUnresolved,
            Self::Force => CommitMode::Replace,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResolutionOutcome {
    Applied { requisition: Requisition, chain: ResolvedChain },
    AlreadyResolved { requisition: Requisition },
}

impl ResolutionOutcome {
    pub fn requisition(&self) -> &Requisition {
        match self {
            Self::Applied { requisition, .. } | Self::AlreadyResolved { requisition } => {
                requisition
            }
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug)]
pub struct BatchItem {
    pub requisition_id: RequisitionId,
    pub result: Result<ResolutionOutcome, ResolutionError>,
}

/// Resolves requisitions end to end: lock, load, resolve, commit, audit and notify.
#[derive(Clone)]
pub struct ResolutionService {
    resolver: WorkflowResolver,
    store: Arc<dyn RequisitionStore>,
    settings: Arc<dyn SettingsProvider>,
    notifier: Arc<dyn ApprovalNotifier>,
    audit: Arc<dyn AuditSink>,
    locks: RequisitionLocks,
    actor: String,
}

impl ResolutionService {
    pub fn new(
        resolver: WorkflowResolver,
        store: Arc<dyn RequisitionStore>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            resolver,
            store,
            settings,
            notifier: Arc::new(NoopNotifier),
            audit: Arc::new(TracingAuditSink),
            locks: RequisitionLocks::default(),
            actor: DEFAULT_ACTOR.to_owned(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ApprovalNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub async fn resolve(
        &self,
        id: &RequisitionId,
        mode: ResolveMode,
        correlation_id: &str,
    ) -> Result<ResolutionOutcome, ResolutionError> {
        let context = AuditContext::new(Some(id.clone()), correlation_id, self.actor.clone());
        let _guard = self.locks.acquire(id).await;
        debug!(
            event_name = "workflow.service.lock_acquired",
            correlation_id,
            requisition_id = %id,
            "requisition lock acquired"
        );

        let result = self.resolve_locked(id, mode, &context).await;
        if let Err(error) = &result {
            warn!(
                event_name = "workflow.service.resolution_failed",
                correlation_id,
                requisition_id = %id,
                error_class = error.class().as_str(),
                error = %error,
                "requisition resolution failed"
            );
            let event = context.event(
                "workflow.resolution_failed",
                AuditCategory::Resolution,
                AuditOutcome::Failed,
            );
            self.audit.emit(
                event
                    .with_metadata("error_class", error.class().as_str())
                    .with_metadata("message", error.to_string()),
            );
        }
        result
    }

    /// Resolves each requisition independently; one failure never stops the batch.
    pub async fn reresolve_batch(
        &self,
        ids: &[RequisitionId],
        mode: ResolveMode,
        correlation_id: &str,
    ) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.resolve(id, mode, correlation_id).await;
            items.push(BatchItem { requisition_id: id.clone(), result });
        }

        let failed = items.iter().filter(|item| item.result.is_err()).count();
        info!(
            event_name = "workflow.service.batch_completed",
            correlation_id,
            total = items.len(),
            failed,
            "batch re-resolution completed"
        );
        items
    }

    pub async fn reresolve_pending(
        &self,
        mode: ResolveMode,
        limit: u32,
        correlation_id: &str,
    ) -> Result<Vec<BatchItem>, ResolutionError> {
        let ids = self.store.list_ids_by_status(RequisitionStatus::Pending, limit).await?;
        Ok(self.reresolve_batch(&ids, mode, correlation_id).await)
    }

    async fn resolve_locked(
        &self,
        id: &RequisitionId,
        mode: ResolveMode,
        context: &AuditContext,
    ) -> Result<ResolutionOutcome, ResolutionError> {
        let requisition = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ResolutionError::RequisitionNotFound(id.clone()))?;

        if mode == ResolveMode::IfUnresolved && requisition.is_resolved() {
            return Ok(self.already_resolved(requisition, context));
        }

        if !requisition.status.is_resolvable() {
            return Err(ResolutionError::NotResolvable {
                requisition_id: id.clone(),
                status: requisition.status,
            });
        }
        if !requisition.can_transition_to(RequisitionStatus::Pending) {
            return Err(DomainError::InvalidRequisitionTransition {
                from: requisition.status,
                to: RequisitionStatus::Pending,
            }
            .into());
        }

        let settings = WorkflowSettings::load(self.settings.as_ref()).await?;
        let chain = match mode {
            ResolveMode::IfUnresolved => self.resolver.resolve(&requisition, &settings).await?,
            ResolveMode::Force => {
                self.resolver.resolve(&requisition.cleared_for_reresolution(), &settings).await?
            }
        };

        let write = ResolutionWrite {
            threshold_id: chain.threshold_id,
            tier: chain.tier.clone(),
            workflow_sequence: chain.steps.clone(),
            next_approver: chain.next_approver,
            status: RequisitionStatus::Pending,
            sla: chain.sla.clone(),
            updated_at: Utc::now(),
        };

        if self.store.commit_resolution(id, &write, mode.commit_mode()).await?
            == CommitOutcome::Skipped
        {
            let current = self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| ResolutionError::RequisitionNotFound(id.clone()))?;
            if !current.status.is_resolvable() {
                return Err(ResolutionError::NotResolvable {
                    requisition_id: id.clone(),
                    status: current.status,
                });
            }
            return Ok(self.already_resolved(current, context));
        }

        let mut updated = requisition;
        write.apply_to(&mut updated);
        updated.check_pending_invariant()?;

        info!(
            event_name = "workflow.service.committed",
            correlation_id = %context.correlation_id,
            requisition_id = %id,
            tier = %chain.tier,
            next_approver = %chain.next_approver,
            forced = mode == ResolveMode::Force,
            "approval chain committed"
        );
        self.audit_applied(&chain, mode, context);

        if settings.approval_email_notifications {
            self.notify(&updated, &chain, context).await;
        }

        Ok(ResolutionOutcome::Applied { requisition: updated, chain })
    }

    fn already_resolved(
        &self,
        requisition: Requisition,
        context: &AuditContext,
    ) -> ResolutionOutcome {
        info!(
            event_name = "workflow.service.already_resolved",
            correlation_id = %context.correlation_id,
            requisition_id = %requisition.id,
            "requisition already resolved; leaving stored chain untouched"
        );
        self.audit.emit(context.event(
            "workflow.resolution_skipped",
            AuditCategory::Resolution,
            AuditOutcome::Skipped,
        ));
        ResolutionOutcome::AlreadyResolved { requisition }
    }

    fn audit_applied(&self, chain: &ResolvedChain, mode: ResolveMode, context: &AuditContext) {
        self.audit.emit(
            context
                .event("workflow.resolved", AuditCategory::Resolution, AuditOutcome::Success)
                .with_metadata("threshold_id", chain.threshold_id.to_string())
                .with_metadata("tier", chain.tier.clone())
                .with_metadata("steps", chain.steps.len().to_string())
                .with_metadata("next_approver", chain.next_approver.to_string())
                .with_metadata("fast_tracked", chain.fast_tracked.to_string())
                .with_metadata("truncated", chain.truncated.to_string())
                .with_metadata("forced", (mode == ResolveMode::Force).to_string()),
        );

        for step in chain.steps.iter().filter(|step| step.auto_escalated) {
            let event = context.event(
                "workflow.step_escalated",
                AuditCategory::Escalation,
                AuditOutcome::Success,
            );
            self.audit.emit(
                event
                    .with_metadata("role", step.role.clone())
                    .with_metadata("approver_id", step.approver_id.to_string())
                    .with_metadata("reason", step.escalation_reason.clone().unwrap_or_default()),
            );
        }
    }

    async fn notify(
        &self,
        requisition: &Requisition,
        chain: &ResolvedChain,
        context: &AuditContext,
    ) {
        let event = ApprovalNeededEvent {
            requisition_id: requisition.id.clone(),
            next_approver_id: chain.next_approver,
            amount: requisition.amount,
            purpose: requisition.purpose.clone(),
            tier: chain.tier.clone(),
            urgent: requisition.is_urgent,
        };

        match self.notifier.approval_needed(&event).await {
            Ok(()) => {
                let sent = context.event(
                    "workflow.notification_sent",
                    AuditCategory::Notification,
                    AuditOutcome::Success,
                );
                self.audit.emit(sent.with_metadata("recipient", chain.next_approver.to_string()));
            }
            Err(error) => {
                warn!(
                    event_name = "workflow.service.notification_failed",
                    correlation_id = %context.correlation_id,
                    requisition_id = %requisition.id,
                    error = %error,
                    "approval notification failed; chain remains committed"
                );
                self.audit.emit(
                    context
                        .event(
                            "workflow.notification_failed",
                            AuditCategory::Notification,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("message", error.to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{ResolutionOutcome, ResolutionService, ResolveMode};
    use crate::audit::InMemoryAuditSink;
    use crate::errors::ApplicationError;
    use crate::domain::directory::UserId;
    use crate::domain::requisition::{Requisition, RequisitionId, RequisitionStatus};
    use crate::notifications::InMemoryNotifier;
    use crate::settings::{keys, InMemorySettings, SettingValue};
    use crate::workflow::memory::{InMemoryDirectory, InMemoryRequisitionStore};
    use crate::workflow::ports::{CommitMode, CommitOutcome, RequisitionStore, ResolutionWrite};
    use crate::workflow::testing::{
        directory_without, org_directory, requisition, resolver, standard_thresholds, ADMIN_ID,
        BRANCH_MANAGER_ID, DEPARTMENT_HEAD_ID,
    };
    use crate::workflow::ResolutionError;

    struct Harness {
        service: ResolutionService,
        store: Arc<InMemoryRequisitionStore>,
        notifier: InMemoryNotifier,
        audit: InMemoryAuditSink,
    }

    fn harness_with(
        directory: InMemoryDirectory,
        store: Arc<InMemoryRequisitionStore>,
        settings: InMemorySettings,
        notifier: InMemoryNotifier,
    ) -> Harness {
        let audit = InMemoryAuditSink::default();
        let service = ResolutionService::new(
            resolver(directory, standard_thresholds()),
            store.clone(),
            Arc::new(settings),
        )
        .with_notifier(Arc::new(notifier.clone()))
        .with_audit_sink(Arc::new(audit.clone()))
        .with_actor("service-test");
        Harness { service, store, notifier, audit }
    }

    fn harness() -> Harness {
        harness_with(
            org_directory(),
            Arc::new(InMemoryRequisitionStore::default()),
            InMemorySettings::default(),
            InMemoryNotifier::default(),
        )
    }

    /// Marks the requisition reviewed just before the commit lands, the way an approval
    /// recorded by another process would.
    struct ReviewedBeforeCommit {
        inner: Arc<InMemoryRequisitionStore>,
    }

    #[async_trait]
    impl RequisitionStore for ReviewedBeforeCommit {
        async fn find_by_id(
            &self,
            id: &RequisitionId,
        ) -> Result<Option<Requisition>, ApplicationError> {
            self.inner.find_by_id(id).await
        }

        async fn save(&self, requisition: Requisition) -> Result<(), ApplicationError> {
            self.inner.save(requisition).await
        }

        async fn list_ids_by_status(
            &self,
            status: RequisitionStatus,
            limit: u32,
        ) -> Result<Vec<RequisitionId>, ApplicationError> {
            self.inner.list_ids_by_status(status, limit).await
        }

        async fn commit_resolution(
            &self,
            id: &RequisitionId,
            write: &ResolutionWrite,
            mode: CommitMode,
        ) -> Result<CommitOutcome, ApplicationError> {
            if let Some(mut current) = self.inner.find_by_id(id).await? {
                current.status = RequisitionStatus::Reviewed;
                self.inner.save(current).await?;
            }
            self.inner.commit_resolution(id, write, mode).await
        }
    }

    async fn seeded(harness: &Harness, requisition: Requisition) -> RequisitionId {
        let id = requisition.id.clone();
        harness.store.save(requisition).await.expect("save");
        id
    }

    #[tokio::test]
    async fn first_resolution_commits_chain_and_moves_draft_to_pending() {
        let harness = harness();
        let id = seeded(&harness, requisition("REQ-1", 15_000)).await;

        let outcome = harness
            .service
            .resolve(&id, ResolveMode::IfUnresolved, "corr-1")
            .await
            .expect("resolve");

        assert!(outcome.was_applied());
        let stored = harness.store.find_by_id(&id).await.expect("load").expect("exists");
        assert_eq!(stored.status, RequisitionStatus::Pending);
        assert_eq!(stored.tier.as_deref(), Some("Tier 2"));
        assert_eq!(stored.next_approver, Some(UserId(BRANCH_MANAGER_ID)));
        assert_eq!(stored.next_approver, stored.workflow_sequence.first().map(|s| s.approver_id));
        assert!(stored.sla.is_assigned());

        let sent = harness.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].next_approver_id, UserId(BRANCH_MANAGER_ID));
        assert_eq!(harness.audit.events_of_type("workflow.resolved").len(), 1);
    }

    #[tokio::test]
    async fn second_unforced_resolution_is_a_no_op() {
        let harness = harness();
        let id = seeded(&harness, requisition("REQ-2", 15_000)).await;

        harness.service.resolve(&id, ResolveMode::IfUnresolved, "corr-a").await.expect("first");
        let before = harness.store.find_by_id(&id).await.expect("load").expect("exists");

        let outcome = harness
            .service
            .resolve(&id, ResolveMode::IfUnresolved, "corr-b")
            .await
            .expect("second");

        assert!(matches!(outcome, ResolutionOutcome::AlreadyResolved { .. }));
        let after = harness.store.find_by_id(&id).await.expect("load").expect("exists");
        assert_eq!(before, after);
        assert_eq!(harness.notifier.sent().len(), 1);
        assert_eq!(harness.audit.events_of_type("workflow.resolution_skipped").len(), 1);
    }

    #[tokio::test]
    async fn forced_resolution_picks_up_directory_changes_and_keeps_sla() {
        let store = Arc::new(InMemoryRequisitionStore::default());
        let first = harness_with(
            org_directory(),
            store.clone(),
            InMemorySettings::default(),
            InMemoryNotifier::default(),
        );
        let id = seeded(&first, requisition("REQ-3", 15_000)).await;
        first.service.resolve(&id, ResolveMode::IfUnresolved, "corr-1").await.expect("first");
        let original = store.find_by_id(&id).await.expect("load").expect("exists");

        let second = harness_with(
            directory_without(&[DEPARTMENT_HEAD_ID]),
            store.clone(),
            InMemorySettings::default(),
            InMemoryNotifier::default(),
        );
        let outcome = second
            .service
            .resolve(&id, ResolveMode::Force, "corr-2")
            .await
            .expect("force");

        assert!(outcome.was_applied());
        let repaired = store.find_by_id(&id).await.expect("load").expect("exists");
        assert_eq!(repaired.workflow_sequence[1].approver_id, UserId(ADMIN_ID));
        assert!(repaired.workflow_sequence[1].auto_escalated);
        assert_eq!(repaired.sla, original.sla);
        assert_eq!(second.audit.events_of_type("workflow.step_escalated").len(), 1);
    }

    #[tokio::test]
    async fn failed_forced_resolution_leaves_prior_chain_in_place() {
        let store = Arc::new(InMemoryRequisitionStore::default());
        let first = harness_with(
            org_directory(),
            store.clone(),
            InMemorySettings::default(),
            InMemoryNotifier::default(),
        );
        let id = seeded(&first, requisition("REQ-4", 15_000)).await;
        first.service.resolve(&id, ResolveMode::IfUnresolved, "corr-1").await.expect("first");
        let original = store.find_by_id(&id).await.expect("load").expect("exists");

        let strict = InMemorySettings::default()
            .with(keys::MAX_REQUISITION_AMOUNT, SettingValue::Text("1,000.00".to_string()));
        let second =
            harness_with(org_directory(), store.clone(), strict, InMemoryNotifier::default());

        let error =
            second.service.resolve(&id, ResolveMode::Force, "corr-2").await.expect_err("must fail");

        assert!(matches!(error, ResolutionError::AmountExceedsMaximum { .. }));
        let after = store.find_by_id(&id).await.expect("load").expect("exists");
        assert_eq!(after, original);
        assert_eq!(second.audit.events_of_type("workflow.resolution_failed").len(), 1);
    }

    #[tokio::test]
    async fn notification_failure_does_not_abort_resolution() {
        let harness = harness_with(
            org_directory(),
            Arc::new(InMemoryRequisitionStore::default()),
            InMemorySettings::default(),
            InMemoryNotifier::failing("mail relay offline"),
        );
        let id = seeded(&harness, requisition("REQ-5", 15_000)).await;

        let outcome = harness
            .service
            .resolve(&id, ResolveMode::IfUnresolved, "corr-5")
            .await
            .expect("resolve");

        assert!(outcome.was_applied());
        assert_eq!(outcome.requisition().status, RequisitionStatus::Pending);
        let failures = harness.audit.events_of_type("workflow.notification_failed");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].metadata["message"].contains("mail relay offline"));
    }

    #[tokio::test]
    async fn notifications_can_be_disabled_by_setting() {
        let harness = harness_with(
            org_directory(),
            Arc::new(InMemoryRequisitionStore::default()),
            InMemorySettings::default()
                .with(keys::APPROVAL_EMAIL_NOTIFICATIONS, SettingValue::Boolean(false)),
            InMemoryNotifier::default(),
        );
        let id = seeded(&harness, requisition("REQ-6", 15_000)).await;

        harness.service.resolve(&id, ResolveMode::IfUnresolved, "corr-6").await.expect("resolve");

        assert!(harness.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_and_terminal_requisitions_are_rejected() {
        let harness = harness();
        let missing = RequisitionId("REQ-404".to_string());
        let error = harness
            .service
            .resolve(&missing, ResolveMode::IfUnresolved, "corr-7")
            .await
            .expect_err("missing");
        assert_eq!(error, ResolutionError::RequisitionNotFound(missing));

        let mut paid = requisition("REQ-PAID", 15_000);
        paid.status = RequisitionStatus::Paid;
        let id = seeded(&harness, paid).await;
        let error =
            harness.service.resolve(&id, ResolveMode::Force, "corr-8").await.expect_err("terminal");
        assert!(matches!(
            error,
            ResolutionError::NotResolvable { status: RequisitionStatus::Paid, .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_resolutions_commit_exactly_once() {
        let harness = harness();
        let id = seeded(&harness, requisition("REQ-9", 15_000)).await;

        let (left, right) = tokio::join!(
            harness.service.resolve(&id, ResolveMode::IfUnresolved, "corr-l"),
            harness.service.resolve(&id, ResolveMode::IfUnresolved, "corr-r"),
        );

        let applied = [left.expect("left"), right.expect("right")]
            .iter()
            .filter(|outcome| outcome.was_applied())
            .count();
        assert_eq!(applied, 1);
        assert_eq!(harness.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn pending_batch_reports_each_requisition_independently() {
        let harness = harness();
        let mut good = requisition("REQ-B1", 15_000);
        good.status = RequisitionStatus::Pending;
        let mut too_large = requisition("REQ-B2", 20_000_000);
        too_large.status = RequisitionStatus::Pending;
        seeded(&harness, good).await;
        seeded(&harness, too_large).await;

        let items = harness
            .service
            .reresolve_pending(ResolveMode::Force, 50, "corr-batch")
            .await
            .expect("batch");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].requisition_id.0, "REQ-B1");
        assert!(items[0].result.is_ok());
        assert!(matches!(
            items[1].result,
            Err(ResolutionError::AmountExceedsMaximum { .. })
        ));
        let amount = harness
            .store
            .find_by_id(&RequisitionId("REQ-B2".to_string()))
            .await
            .expect("load")
            .expect("exists")
            .amount;
        assert_eq!(amount, Decimal::new(20_000_000, 0));
    }

    #[tokio::test]
    async fn forced_resolution_does_not_reopen_a_requisition_reviewed_meanwhile() {
        let inner = Arc::new(InMemoryRequisitionStore::default());
        let mut pending = requisition("REQ-RACE", 15_000);
        pending.status = RequisitionStatus::Pending;
        let id = pending.id.clone();
        inner.save(pending).await.expect("save");

        let audit = InMemoryAuditSink::default();
        let service = ResolutionService::new(
            resolver(org_directory(), standard_thresholds()),
            Arc::new(ReviewedBeforeCommit { inner: inner.clone() }),
            Arc::new(InMemorySettings::default()),
        )
        .with_audit_sink(Arc::new(audit.clone()));

        let error = service.resolve(&id, ResolveMode::Force, "race").await.expect_err("advanced");
        assert!(matches!(
            error,
            ResolutionError::NotResolvable { status: RequisitionStatus::Reviewed, .. }
        ));

        let stored = inner.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequisitionStatus::Reviewed);
        assert!(stored.workflow_sequence.is_empty());
        assert!(audit.events_of_type("workflow.resolved").is_empty());
    }
}

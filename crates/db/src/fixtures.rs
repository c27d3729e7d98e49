use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Expected routing for each seeded requisition once resolved against the seeded directory.
pub const SEED_REQUISITIONS: &[SeedRequisitionContract] = &[
    SeedRequisitionContract {
        requisition_id: "REQ-SEED-001",
        scenario: "branch_tier_2",
        expected_tier: "Tier 2",
        expected_threshold_id: 2,
        expected_approvers: &[3, 4],
        description: "Branch staff request routed through branch manager and department head",
    },
    SeedRequisitionContract {
        requisition_id: "REQ-SEED-002",
        scenario: "treasury_override",
        expected_tier: "Tier 2",
        expected_threshold_id: 2,
        expected_approvers: &[6, 7],
        description: "Treasury request rerouted to group finance manager and CFO",
    },
    SeedRequisitionContract {
        requisition_id: "REQ-SEED-003",
        scenario: "urgent_fast_track",
        expected_tier: "Tier 3",
        expected_threshold_id: 3,
        expected_approvers: &[6],
        description: "Urgent Tier 3 request fast-tracked to the final approver",
    },
    SeedRequisitionContract {
        requisition_id: "REQ-SEED-004",
        scenario: "hq_ceo_escalation",
        expected_tier: "Tier 4",
        expected_threshold_id: 4,
        expected_approvers: &[4, 6, 7, 8],
        description: "HQ request above the CEO ceiling with CEO appended",
    },
    SeedRequisitionContract {
        requisition_id: "REQ-SEED-005",
        scenario: "field_priority_override",
        expected_tier: "Tier 2 Field",
        expected_threshold_id: 5,
        expected_approvers: &[11, 6],
        description: "Field request matched by the higher-priority field threshold",
    },
];

const SEED_USER_COUNT: i64 = 12;
const SEED_THRESHOLD_COUNT: i64 = 5;

/// Seeded organisation: directory users, approval thresholds and draft requisitions covering
/// the main routing scenarios.
pub struct OrgSeedDataset;

impl OrgSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/org_seed_data.sql");

    /// Loads the dataset. Reloading resets seeded requisitions to unresolved drafts.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let requisitions_seeded = SEED_REQUISITIONS
            .iter()
            .map(|contract| RequisitionSeedInfo {
                requisition_id: contract.requisition_id,
                scenario: contract.scenario,
                description: contract.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { requisitions_seeded })
    }

    /// Checks that every seeded row is present. Does not look at resolution state.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM directory_user WHERE id BETWEEN 1 AND ?1")
                .bind(SEED_USER_COUNT)
                .fetch_one(pool)
                .await?;
        checks.push(("directory-users", user_count == SEED_USER_COUNT));

        let threshold_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM approval_threshold WHERE id BETWEEN 1 AND ?1 AND active = 1",
        )
        .bind(SEED_THRESHOLD_COUNT)
        .fetch_one(pool)
        .await?;
        checks.push(("approval-thresholds", threshold_count == SEED_THRESHOLD_COUNT));

        let active_admin: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM directory_user WHERE role = 'admin' AND active = 1)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("active-admin", active_admin == 1));

        for contract in SEED_REQUISITIONS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM requisition WHERE id = ?1)")
                    .bind(contract.requisition_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((contract.requisition_id, exists == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded requisitions, thresholds and users.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_requisitions = sql_array_from_ids(
            &SEED_REQUISITIONS.iter().map(|contract| contract.requisition_id).collect::<Vec<_>>(),
        );

        sqlx::query(&format!("DELETE FROM requisition WHERE id IN {quoted_requisitions}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM approval_threshold WHERE id BETWEEN 1 AND ?1")
            .bind(SEED_THRESHOLD_COUNT)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM directory_user WHERE id BETWEEN 1 AND ?1")
            .bind(SEED_USER_COUNT)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeedRequisitionContract {
    pub requisition_id: &'static str,
    pub scenario: &'static str,
    pub expected_tier: &'static str,
    pub expected_threshold_id: i64,
    pub expected_approvers: &'static [i64],
    pub description: &'static str,
}

impl SeedRequisitionContract {
    pub fn expected_next_approver(&self) -> Option<i64> {
        self.expected_approvers.first().copied()
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub requisitions_seeded: Vec<RequisitionSeedInfo>,
}

#[derive(Debug)]
pub struct RequisitionSeedInfo {
    pub requisition_id: &'static str,
    pub scenario: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

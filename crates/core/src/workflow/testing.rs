//! Shared organization used by resolver and service tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::directory::{BranchId, CompanyId, DirectoryUser, RegionId, UserId};
use crate::domain::requisition::{
    OriginType, Requester, Requisition, RequisitionId, RequisitionStatus, SlaDeadlines,
};
use crate::domain::threshold::{ApprovalThreshold, ThresholdId, ANY_ORIGIN};
use crate::settings::WorkflowSettings;
use crate::workflow::memory::{InMemoryDirectory, InMemoryThresholds};
use crate::workflow::WorkflowResolver;

pub const ADMIN_ID: i64 = 1;
pub const REQUESTER_ID: i64 = 2;
pub const BRANCH_MANAGER_ID: i64 = 3;
pub const DEPARTMENT_HEAD_ID: i64 = 4;
pub const OTHER_BRANCH_MANAGER_ID: i64 = 5;
pub const GFM_ID: i64 = 6;
pub const CFO_ID: i64 = 7;
pub const CEO_ID: i64 = 8;
pub const TREASURY_ID: i64 = 9;

const HOME_BRANCH: i64 = 10;
const OTHER_BRANCH: i64 = 20;

fn user(id: i64, role: &str, branch: Option<i64>) -> DirectoryUser {
    DirectoryUser {
        id: UserId(id),
        display_name: format!("{role} {id}"),
        role: role.to_string(),
        active: true,
        company_id: Some(CompanyId(1)),
        region_id: Some(RegionId(if branch == Some(OTHER_BRANCH) { 2 } else { 1 })),
        branch_id: branch.map(BranchId),
    }
}

pub fn org_users() -> Vec<DirectoryUser> {
    vec![
        user(ADMIN_ID, "admin", None),
        user(REQUESTER_ID, "staff", Some(HOME_BRANCH)),
        user(BRANCH_MANAGER_ID, "branch_manager", Some(HOME_BRANCH)),
        user(DEPARTMENT_HEAD_ID, "department_head", Some(HOME_BRANCH)),
        user(OTHER_BRANCH_MANAGER_ID, "branch_manager", Some(OTHER_BRANCH)),
        user(GFM_ID, "group_finance_manager", None),
        user(CFO_ID, "cfo", None),
        user(CEO_ID, "ceo", None),
        user(TREASURY_ID, "treasury", None),
    ]
}

pub fn org_directory() -> InMemoryDirectory {
    InMemoryDirectory::with_users(org_users())
}

pub fn directory_without(ids: &[i64]) -> InMemoryDirectory {
    InMemoryDirectory::with_users(
        org_users().into_iter().filter(|user| !ids.contains(&user.id.0)).collect(),
    )
}

pub fn threshold(
    id: i64,
    name: &str,
    min_amount: i64,
    max_amount: i64,
    priority: i32,
    roles: &[&str],
) -> ApprovalThreshold {
    ApprovalThreshold {
        id: ThresholdId(id),
        name: name.to_string(),
        min_amount: Decimal::new(min_amount, 0),
        max_amount: Decimal::new(max_amount, 0),
        roles: roles.iter().map(|role| role.to_string()).collect(),
        active: true,
        priority,
        origin_type: ANY_ORIGIN.to_string(),
        urgent_fast_track_allowed: true,
        requires_cfo: false,
    }
}

/// Four contiguous tiers; each lower bound sits one cent above the previous ceiling.
pub fn standard_thresholds() -> Vec<ApprovalThreshold> {
    let mut tier_two = threshold(2, "Tier 2", 0, 50_000, 1, &["branch_manager", "department_head"]);
    tier_two.min_amount = Decimal::new(1_000_001, 2);
    let mut tier_three = threshold(
        3,
        "Tier 3",
        0,
        250_000,
        1,
        &["branch_manager", "department_head", "group_finance_manager"],
    );
    tier_three.min_amount = Decimal::new(5_000_001, 2);
    let mut tier_four = threshold(
        4,
        "Tier 4",
        0,
        10_000_000,
        1,
        &["department_head", "group_finance_manager", "cfo"],
    );
    tier_four.min_amount = Decimal::new(25_000_001, 2);
    tier_four.urgent_fast_track_allowed = false;

    vec![threshold(1, "Tier 1", 0, 10_000, 1, &["branch_manager"]), tier_two, tier_three, tier_four]
}

pub fn settings() -> WorkflowSettings {
    WorkflowSettings::default()
}

pub fn resolver(
    directory: InMemoryDirectory,
    thresholds: Vec<ApprovalThreshold>,
) -> WorkflowResolver {
    WorkflowResolver::new(
        Arc::new(directory),
        Arc::new(InMemoryThresholds::with_thresholds(thresholds)),
    )
}

pub fn requisition(id: &str, amount: i64) -> Requisition {
    let created_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().unwrap_or_else(Utc::now);
    Requisition {
        id: RequisitionId(id.to_string()),
        requester: Requester { id: UserId(REQUESTER_ID), role: "staff".to_string() },
        origin: OriginType::Branch,
        company_id: Some(CompanyId(1)),
        region_id: Some(RegionId(1)),
        branch_id: Some(BranchId(HOME_BRANCH)),
        department_id: None,
        amount: Decimal::new(amount, 0),
        purpose: "Branch laptops".to_string(),
        is_urgent: false,
        tier: None,
        applied_threshold_id: None,
        workflow_sequence: Vec::new(),
        next_approver: None,
        status: RequisitionStatus::Draft,
        sla: SlaDeadlines::default(),
        created_at,
        updated_at: created_at,
    }
}

//! Role-chain construction as a pipeline of pure stages.
//!
//! `raw -> treasury_filtered -> overridden -> self_approval_filtered -> amount_augmented`
//!
//! Each stage takes the previous sequence by reference and returns a new one, and the
//! whole trace is kept on the resolved chain so the order of operations can be audited.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::threshold::tier_level;
use crate::settings::WorkflowSettings;
use crate::workflow::{
    normalize_role, same_role, CEO, CFO, DEPARTMENT_HEAD, GROUP_FINANCE_MANAGER, TREASURY,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChainTrace {
    pub raw: Vec<String>,
    pub treasury_filtered: Vec<String>,
    pub overridden: Vec<String>,
    pub self_approval_filtered: Vec<String>,
    pub amount_augmented: Vec<String>,
}

impl RoleChainTrace {
    pub fn roles(&self) -> &[String] {
        &self.amount_augmented
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RoleChainInput<'a> {
    pub threshold_roles: &'a [String],
    pub requires_cfo: bool,
    pub tier: &'a str,
    pub requester_role: &'a str,
    pub amount: Decimal,
    pub settings: &'a WorkflowSettings,
}

pub fn build_role_chain(input: RoleChainInput<'_>) -> RoleChainTrace {
    let raw: Vec<String> = input
        .threshold_roles
        .iter()
        .map(|role| role.trim().to_string())
        .filter(|role| !role.is_empty())
        .collect();
    let treasury_filtered = without_treasury(&raw);
    let overridden = apply_treasury_override(&treasury_filtered, input.requester_role, input.tier);
    let self_approval_filtered = without_requester_role(
        &overridden,
        input.requester_role,
        input.settings.allow_self_approval,
    );
    let amount_augmented = with_amount_escalation(
        &self_approval_filtered,
        input.amount,
        input.settings,
        input.requires_cfo,
    );

    RoleChainTrace { raw, treasury_filtered, overridden, self_approval_filtered, amount_augmented }
}

/// Treasury validates and notifies but never approves, whatever the threshold data says.
pub fn without_treasury(roles: &[String]) -> Vec<String> {
    roles.iter().filter(|role| !same_role(role, TREASURY)).cloned().collect()
}

/// Requisitions raised by treasury follow a fixed chain per tier instead of the threshold's.
pub fn apply_treasury_override(roles: &[String], requester_role: &str, tier: &str) -> Vec<String> {
    if !same_role(requester_role, TREASURY) {
        return roles.to_vec();
    }

    let replacement: &[&str] = match tier_level(tier) {
        Some(1) => &[DEPARTMENT_HEAD, GROUP_FINANCE_MANAGER],
        Some(2) | Some(3) => &[GROUP_FINANCE_MANAGER, CFO],
        Some(4) => &[CFO, CEO],
        _ => return roles.to_vec(),
    };

    replacement.iter().map(|role| (*role).to_string()).collect()
}

pub fn without_requester_role(
    roles: &[String],
    requester_role: &str,
    allow_self_approval: bool,
) -> Vec<String> {
    if allow_self_approval {
        return roles.to_vec();
    }

    roles.iter().filter(|role| !same_role(role, requester_role)).cloned().collect()
}

pub fn with_amount_escalation(
    roles: &[String],
    amount: Decimal,
    settings: &WorkflowSettings,
    requires_cfo: bool,
) -> Vec<String> {
    let mut augmented = roles.to_vec();
    let contains =
        |roles: &[String], wanted: &str| roles.iter().any(|role| same_role(role, wanted));

    if amount > settings.max_payment_without_ceo {
        if !contains(&augmented, CEO) {
            augmented.push(CEO.to_string());
        }
    } else if amount > settings.max_payment_without_cfo && !contains(&augmented, CFO) {
        augmented.push(CFO.to_string());
    }

    if requires_cfo && !contains(&augmented, CFO) {
        let position = augmented
            .iter()
            .position(|role| normalize_role(role) == CEO)
            .unwrap_or(augmented.len());
        augmented.insert(position, CFO.to_string());
    }

    augmented
}

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::requisition::OriginType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThresholdId(pub i64);

impl fmt::Display for ThresholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const ANY_ORIGIN: &str = "ANY";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalThreshold {
    pub id: ThresholdId,
    /// Tier label shown to users, e.g. `Tier 2`.
    pub name: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub roles: Vec<String>,
    pub active: bool,
    pub priority: i32,
    pub origin_type: String,
    pub urgent_fast_track_allowed: bool,
    pub requires_cfo: bool,
}

impl ApprovalThreshold {
    pub fn contains(&self, amount: Decimal) -> bool {
        self.min_amount <= amount && amount <= self.max_amount
    }

    pub fn applies_to_origin(&self, origin: OriginType) -> bool {
        let filter = self.origin_type.trim();
        filter.eq_ignore_ascii_case(ANY_ORIGIN) || filter.eq_ignore_ascii_case(origin.as_str())
    }
}

/// Numeric tier parsed out of a tier label such as `Tier 3`.
pub fn tier_level(label: &str) -> Option<u8> {
    let digits: String = label
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c.is_whitespace() || c == '-')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

pub const TOP_TIER_LEVEL: u8 = 4;

pub fn is_top_tier(label: &str) -> bool {
    tier_level(label) == Some(TOP_TIER_LEVEL)
}

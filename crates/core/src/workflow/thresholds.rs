use rust_decimal::Decimal;

use crate::domain::requisition::OriginType;
use crate::domain::threshold::ApprovalThreshold;

/// Active thresholds in match order: `(priority, min_amount)` ascending, id as the final
/// tie-break so overlapping rows with identical keys still match deterministically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThresholdTable {
    thresholds: Vec<ApprovalThreshold>,
}

impl ThresholdTable {
    pub fn new(thresholds: Vec<ApprovalThreshold>) -> Self {
        let mut thresholds: Vec<ApprovalThreshold> =
            thresholds.into_iter().filter(|threshold| threshold.active).collect();
        thresholds.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.min_amount.cmp(&right.min_amount))
                .then_with(|| left.id.cmp(&right.id))
        });
        Self { thresholds }
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn matching(&self, amount: Decimal, origin: OriginType) -> Option<&ApprovalThreshold> {
        self.thresholds
            .iter()
            .filter(|threshold| threshold.applies_to_origin(origin))
            .find(|threshold| threshold.contains(amount))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::ThresholdTable;
    use crate::domain::requisition::OriginType;
    use crate::domain::threshold::{ApprovalThreshold, ThresholdId};

    fn threshold(id: i64, min: i64, max: i64, priority: i32, origin: &str) -> ApprovalThreshold {
        ApprovalThreshold {
            id: ThresholdId(id),
            name: format!("Tier {id}"),
            min_amount: Decimal::new(min, 0),
            max_amount: Decimal::new(max, 0),
            roles: vec!["branch_manager".to_string()],
            active: true,
            priority,
            origin_type: origin.to_string(),
            urgent_fast_track_allowed: true,
            requires_cfo: false,
        }
    }

    #[test]
    fn overlapping_ranges_pick_lowest_priority_then_min_amount() {
        let table = ThresholdTable::new(vec![
            threshold(1, 0, 50_000, 2, "ANY"),
            threshold(2, 10_000, 20_000, 1, "ANY"),
            threshold(3, 5_000, 20_000, 1, "ANY"),
        ]);

        let matched = table.matching(Decimal::new(15_000, 0), OriginType::Branch).expect("match");
        assert_eq!(matched.id, ThresholdId(3));

        let matched = table.matching(Decimal::new(30_000, 0), OriginType::Branch).expect("match");
        assert_eq!(matched.id, ThresholdId(1));
    }

    #[test]
    fn origin_filter_is_case_insensitive_and_any_matches_all() {
        let table = ThresholdTable::new(vec![
            threshold(1, 0, 100_000, 1, "HQ"),
            threshold(2, 0, 100_000, 5, "any"),
        ]);

        assert_eq!(
            table.matching(Decimal::new(500, 0), OriginType::Hq).map(|t| t.id),
            Some(ThresholdId(1))
        );
        assert_eq!(
            table.matching(Decimal::new(500, 0), OriginType::Field).map(|t| t.id),
            Some(ThresholdId(2))
        );
    }

    #[test]
    fn inactive_thresholds_never_match() {
        let mut inactive = threshold(1, 0, 100_000, 1, "ANY");
        inactive.active = false;
        let table = ThresholdTable::new(vec![inactive]);

        assert!(table.is_empty());
        assert!(table.matching(Decimal::new(10, 0), OriginType::Branch).is_none());
    }

    #[test]
    fn amount_outside_every_range_has_no_match() {
        let table = ThresholdTable::new(vec![threshold(1, 0, 100_000, 1, "ANY")]);
        assert!(table.matching(Decimal::new(100_001, 0), OriginType::Branch).is_none());
    }
}

use crate::domain::requisition::ApprovalStep;
use crate::domain::threshold::is_top_tier;
use crate::workflow::candidates::PendingStep;

#[derive(Clone, Copy, Debug)]
pub struct FastTrackInput<'a> {
    pub is_urgent: bool,
    pub fast_track_enabled: bool,
    pub threshold_allows: bool,
    pub tier: &'a str,
}

impl FastTrackInput<'_> {
    fn eligible(&self) -> bool {
        self.is_urgent
            && self.fast_track_enabled
            && self.threshold_allows
            && !is_top_tier(self.tier)
    }
}

/// Urgent requests below the top tier go straight to the final approver, provided that
/// approver was actually found. Returns the (possibly collapsed) chain and whether it collapsed.
pub fn fast_track(steps: Vec<PendingStep>, input: FastTrackInput<'_>) -> (Vec<PendingStep>, bool) {
    let last_resolved = steps.last().is_some_and(PendingStep::is_resolved);
    if !input.eligible() || steps.len() <= 1 || !last_resolved {
        return (steps, false);
    }

    let mut steps = steps;
    let last = steps.split_off(steps.len() - 1);
    (last, true)
}

/// Keeps the first `max_steps` steps. Returns whether anything was cut.
pub fn truncate(mut steps: Vec<ApprovalStep>, max_steps: usize) -> (Vec<ApprovalStep>, bool) {
    let max_steps = max_steps.max(1);
    if steps.len() <= max_steps {
        return (steps, false);
    }
    steps.truncate(max_steps);
    (steps, true)
}
